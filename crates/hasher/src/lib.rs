//! Streaming multi-digest hasher (component B).
//!
//! A [`Hasher`] is fed bytes via [`Hasher::write`] as they arrive from a
//! submission and, at end of stream, yields the set of content URIs for the
//! blob (one per configured algorithm) plus the internal hash used to name
//! the blob on disk.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use efs_core::uri::ContentUri;
use md5::Md5;
use sha1::Sha1;
use sha2::digest::{FixedOutput, Update};
use sha2::Sha256;
use thiserror::Error;

/// Errors a [`Hasher`] can produce.
#[derive(Debug, Error)]
pub enum HasherError {
    /// `write` was called after `end`, or `end` was called twice.
    #[error("hasher used after end()")]
    AlreadyEnded,
}

/// The fixed, build-time set of digest algorithms computed over every
/// submission, in the canonical order their URIs are emitted. Element 0 is
/// the canonical algorithm: its digest is the internal hash and its URI is
/// the primary URI. `sha1` and `md5` are carried as legacy/weak secondary
/// digests, mirroring StrongLink's historical multi-algorithm URI family;
/// neither is used for the internal hash.
const ALGORITHMS: [&str; 3] = ["sha256", "sha1", "md5"];

enum Digests {
    Running { sha256: Sha256, sha1: Sha1, md5: Md5 },
    Ended,
}

/// Stateful streaming digest over a declared MIME type.
///
/// The declared type is accepted for symmetry with the original API (a
/// future build could vary the algorithm set by type) but this build hashes
/// every submission with the same fixed algorithm set regardless of type.
pub struct Hasher {
    digests: Digests,
}

impl Hasher {
    /// Create a hasher for a submission of the given declared MIME type.
    #[must_use]
    pub fn new(_declared_type: &str) -> Self {
        Self { digests: Digests::Running { sha256: Sha256::default(), sha1: Sha1::default(), md5: Md5::default() } }
    }

    /// Feed bytes into every configured digest. Calling this after [`Hasher::end`]
    /// is a logic error and returns [`HasherError::AlreadyEnded`].
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), HasherError> {
        match &mut self.digests {
            Digests::Running { sha256, sha1, md5 } => {
                Update::update(sha256, bytes);
                Update::update(sha1, bytes);
                Update::update(md5, bytes);
                Ok(())
            }
            Digests::Ended => Err(HasherError::AlreadyEnded),
        }
    }

    /// Finalize every digest and return the content URI list in canonical
    /// order, plus the internal hash (the canonical algorithm's hex digest,
    /// also the URI body of `uris[0]`).
    pub fn end(&mut self) -> Result<(Vec<ContentUri>, String), HasherError> {
        let Digests::Running { sha256, sha1, md5 } = std::mem::replace(&mut self.digests, Digests::Ended) else {
            return Err(HasherError::AlreadyEnded);
        };
        let sha256_hex = hex::encode(FixedOutput::finalize_fixed(sha256));
        let sha1_hex = hex::encode(FixedOutput::finalize_fixed(sha1));
        let md5_hex = hex::encode(FixedOutput::finalize_fixed(md5));

        let hexes = [&sha256_hex, &sha1_hex, &md5_hex];
        let uris = ALGORITHMS
            .iter()
            .zip(hexes.iter())
            .map(|(algo, hex)| ContentUri::new(*algo, (*hex).clone()).expect("hex digest is valid"))
            .collect::<Vec<_>>();

        let internal_hash = sha256_hex;
        Ok((uris, internal_hash))
    }
}

/// The canonical algorithm name (element 0 of [`ALGORITHMS`]), whose digest
/// is the internal hash and whose URI is the primary URI.
#[must_use]
pub fn canonical_algorithm() -> &'static str {
    ALGORITHMS[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_yields_uris_in_canonical_order() {
        let mut h = Hasher::new("text/plain; charset=utf-8");
        h.write(b"hello\n").unwrap();
        let (uris, internal_hash) = h.end().unwrap();
        assert_eq!(uris.len(), ALGORITHMS.len());
        assert_eq!(uris[0].algo(), canonical_algorithm());
        assert_eq!(uris[0].digest_hex(), internal_hash);
    }

    #[test]
    fn identical_content_yields_identical_internal_hash() {
        let mut a = Hasher::new("text/plain; charset=utf-8");
        a.write(b"hello\n").unwrap();
        let (_, hash_a) = a.end().unwrap();

        let mut b = Hasher::new("text/plain; charset=utf-8");
        b.write(b"hel").unwrap();
        b.write(b"lo\n").unwrap();
        let (_, hash_b) = b.end().unwrap();

        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn secondary_algorithms_are_sha1_and_md5() {
        let mut h = Hasher::new("text/plain; charset=utf-8");
        h.write(b"hello\n").unwrap();
        let (uris, _) = h.end().unwrap();
        assert_eq!(uris[1].algo(), "sha1");
        assert_eq!(uris[2].algo(), "md5");
    }

    #[test]
    fn write_after_end_errors() {
        let mut h = Hasher::new("text/plain; charset=utf-8");
        h.write(b"x").unwrap();
        h.end().unwrap();
        assert!(matches!(h.write(b"y"), Err(HasherError::AlreadyEnded)));
    }
}
