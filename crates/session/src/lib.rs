//! Session (component F) and Repo (component G): authenticated handles
//! bundling user identity and capability mode, and the top-level registry
//! of paths, KV handle, session cache, and commit notifier they sit on.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod mode;
mod query;
mod repo;
mod session;
mod user;

pub use mode::{Mode, MODE_ADMIN, MODE_READ, MODE_REGISTER, MODE_WRITE};
pub use query::{copy_filtered_uris, get_file_info, get_value_for_field, FileInfo, UriFilter};
pub use repo::Repo;
pub use session::{parse_cookie, Session, SessionCache, SESSION_KEY_HEX, SESSION_KEY_LEN};
pub use user::{create_user, PASS_MAX, PASS_MIN, USER_MAX, USER_MIN};
