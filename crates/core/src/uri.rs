//! Content URI syntax: `hash://<algo>/<lowerhex-digest>`.

use std::fmt;

use crate::error::EfsError;

/// A parsed content URI: an algorithm name and its lowercase hex digest.
///
/// Two URIs may alias the same blob; two blobs are the same iff their
/// internal hashes (the canonical algorithm's digest) agree.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ContentUri {
    algo: String,
    digest_hex: String,
}

impl ContentUri {
    /// Build a content URI from an algorithm name and lowercase hex digest.
    /// The algorithm name is lowercased; the digest is validated to be
    /// lowercase hex but not checked against any particular length, since
    /// the set of supported algorithms is owned by the hasher crate.
    pub fn new(algo: impl Into<String>, digest_hex: impl Into<String>) -> Result<Self, EfsError> {
        let algo = algo.into().to_ascii_lowercase();
        let digest_hex = digest_hex.into();
        if algo.is_empty() {
            return Err(EfsError::InvalidArgument("content uri algo must not be empty".into()));
        }
        if digest_hex.is_empty() || !digest_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(EfsError::InvalidArgument("content uri digest must be lowercase hex".into()));
        }
        if digest_hex.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(EfsError::InvalidArgument("content uri digest must be lowercase".into()));
        }
        Ok(Self { algo, digest_hex })
    }

    /// The algorithm component, e.g. `sha256`.
    #[must_use]
    pub fn algo(&self) -> &str {
        &self.algo
    }

    /// The lowercase hex digest component.
    #[must_use]
    pub fn digest_hex(&self) -> &str {
        &self.digest_hex
    }

    /// Parse a `hash://<algo>/<digest>` string.
    pub fn parse(s: &str) -> Result<Self, EfsError> {
        let rest = s
            .strip_prefix("hash://")
            .ok_or_else(|| EfsError::InvalidArgument(format!("not a content uri: {s}")))?;
        let (algo, digest_hex) = rest
            .split_once('/')
            .ok_or_else(|| EfsError::InvalidArgument(format!("malformed content uri: {s}")))?;
        Self::new(algo, digest_hex)
    }
}

impl fmt::Display for ContentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hash://{}/{}", self.algo, self.digest_hex)
    }
}
