//! Shared types for the EarthFS submission and indexing core.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod meta_type;
pub mod uri;

pub use error::EfsError;
pub use uri::ContentUri;
