//! The tagged error sum propagated across every EarthFS core crate.

use thiserror::Error;

/// Error kinds propagated by the submission, indexing, and session layers.
///
/// Each variant corresponds to one of the error kinds named in the core
/// design: invalid argument, IO, duplicate, transaction, limit exceeded,
/// not found, and capability denied.
#[derive(Debug, Error)]
pub enum EfsError {
    /// A caller-supplied argument was missing or out of range (null session,
    /// missing type, out-of-range username/password, unsupported mode).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A filesystem operation failed (temp-file creation, short write,
    /// fsync/close failure, etc).
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A no-overwrite insert collided with an existing key. Callers that can
    /// recover by reusing the existing value (file dedup) should match on
    /// this variant; callers that cannot (duplicate username) should
    /// surface it.
    #[error("duplicate key")]
    Duplicate,

    /// A KV transaction failed to begin or commit. Always surfaced; the
    /// transaction is aborted.
    #[error("transaction: {0}")]
    Transaction(String),

    /// A URI lookup found no matching file or meta-file.
    #[error("not found")]
    NotFound,

    /// The session's mode lacks the capability bit required for this
    /// operation.
    #[error("capability denied")]
    CapabilityDenied,

    /// A submission entered an operation invalid for its current state
    /// machine phase (e.g. `write` after `end`).
    #[error("invalid submission state: {0}")]
    InvalidState(&'static str),
}

impl EfsError {
    /// True if this error represents a recoverable no-overwrite collision
    /// (as opposed to a transaction-fatal error).
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, EfsError::Duplicate)
    }
}

/// Convenience alias used throughout the core crates.
pub type Result<T> = std::result::Result<T, EfsError>;
