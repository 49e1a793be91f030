//! The capability bitmask backing a session's granted permissions.

/// A bitmask of granted capabilities. Zero means no capabilities; a zero
/// session is a valid value but cannot be created directly (`Session::create`
/// rejects a zero mode) since it describes an anonymous, capability-less
/// identity rather than an authenticated one.
pub type Mode = u32;

/// Permits read-only queries (`copy_filtered_uris`, `get_file_info`,
/// `get_value_for_field`).
pub const MODE_READ: Mode = 1 << 0;

/// Permits submitting content.
pub const MODE_WRITE: Mode = 1 << 1;

/// Permits administrative operations (not further specified here).
pub const MODE_ADMIN: Mode = 1 << 2;

/// Permits `create_user` to succeed against the owning repo.
pub const MODE_REGISTER: Mode = 1 << 3;
