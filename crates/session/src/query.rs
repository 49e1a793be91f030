//! Read-side queries: filtered URI enumeration, file info lookup, and
//! meta-field lookup. All three require `MODE_READ` on the calling
//! session — the originating implementation evaluated these with no
//! capability check at all, which this crate treats as an oversight
//! rather than a behavior to preserve.

use std::path::PathBuf;

use efs_core::{EfsError, Result};
use kvstore::{keys, Db, Txn, TxnMode};

use crate::mode::MODE_READ;
use crate::repo::Repo;
use crate::session::Session;

fn require_read(session: &Session) -> Result<()> {
    if session.mode() & MODE_READ == 0 {
        return Err(EfsError::CapabilityDenied);
    }
    Ok(())
}

/// A caller-supplied predicate standing in for the query/filter language
/// evaluator, which is out of scope here. `copy_filtered_uris` applies it
/// to each candidate URI in turn.
pub trait UriFilter {
    /// Return true if `uri` should be included in the result.
    fn matches(&self, uri: &str) -> bool;
}

impl<F: Fn(&str) -> bool> UriFilter for F {
    fn matches(&self, uri: &str) -> bool {
        self(uri)
    }
}

/// The resolved identity of a stored file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileInfo {
    /// The file's internal (canonical) content hash.
    pub internal_hash: String,
    /// The file's declared content type.
    pub file_type: String,
    /// The file's size in bytes.
    pub size: u64,
    /// Its on-disk path under the repo's blob store.
    pub path: PathBuf,
}

/// Open a read-only transaction, walk the URI index from most recent to
/// oldest, and collect up to `max` URIs for which `filter` returns true.
pub async fn copy_filtered_uris(
    repo: &Repo,
    session: &Session,
    filter: &dyn UriFilter,
    max: usize,
) -> Result<Vec<String>> {
    require_read(session)?;
    if max == 0 {
        return Ok(Vec::new());
    }

    let txn = repo.db().begin(TxnMode::ReadOnly).await?;
    let prefix = keys::uri_and_file_id_table_prefix();
    let mut rows = txn.scan_prefix(&prefix).await?;
    // The index is in ascending key order (URI, fileID); "most recent
    // first" over that is a reverse walk.
    rows.reverse();

    let mut out = Vec::new();
    for (key, _) in rows {
        let Some((uri, _file_id)) = keys::uri_and_file_id_key_unpack(&key) else {
            continue;
        };
        if filter.matches(&uri) {
            out.push(uri);
            if out.len() == max {
                break;
            }
        }
    }
    Ok(out)
}

/// Resolve `uri` to the file it names via the `(URI, fileID)` index,
/// returning its hash, type, size, and on-disk path. Returns
/// `EfsError::NotFound` if the URI has never been indexed.
pub async fn get_file_info(repo: &Repo, session: &Session, uri: &str) -> Result<FileInfo> {
    require_read(session)?;

    let txn = repo.db().begin(TxnMode::ReadOnly).await?;
    let prefix = keys::uri_and_file_id_prefix(uri);
    let rows = txn.scan_prefix(&prefix).await?;
    let (_, file_id) = rows.first().and_then(|(k, _)| keys::uri_and_file_id_key_unpack(k)).ok_or(EfsError::NotFound)?;

    let val = txn.get(&keys::file_by_id_key(file_id)).await?.ok_or(EfsError::NotFound)?;
    let (internal_hash, file_type, size) = keys::file_by_id_val_unpack(&val).ok_or(EfsError::NotFound)?;
    let path = repo.blobs().internal_path(&internal_hash);

    Ok(FileInfo { internal_hash, file_type, size, path })
}

/// Walk `uri`'s `(targetURI, metaFileID)` entries, then each meta-file's
/// `(metaFileID, field, value)` entries, returning the first non-empty
/// value found, truncated to at most `max_bytes` bytes (on a UTF-8 char
/// boundary). Returns `Ok(None)` if no meta-file carries a value for
/// `field`.
pub async fn get_value_for_field(
    repo: &Repo,
    session: &Session,
    uri: &str,
    field: &str,
    max_bytes: usize,
) -> Result<Option<String>> {
    require_read(session)?;

    let txn = repo.db().begin(TxnMode::ReadOnly).await?;
    let meta_prefix = keys::target_uri_and_meta_file_id_prefix(uri);
    let meta_rows = txn.scan_prefix(&meta_prefix).await?;

    for (key, _) in meta_rows {
        let Some((_target, meta_file_id)) = keys::target_uri_and_meta_file_id_key_unpack(&key) else {
            continue;
        };
        let field_prefix = keys::meta_file_id_field_prefix(meta_file_id, field);
        let value_rows = txn.scan_prefix(&field_prefix).await?;
        for (value_key, _) in value_rows {
            let Some((_, _, value)) = keys::meta_file_id_field_and_value_key_unpack(&value_key) else {
                continue;
            };
            if !value.is_empty() {
                return Ok(Some(truncate_to_byte_limit(&value, max_bytes)));
            }
        }
    }
    Ok(None)
}

fn truncate_to_byte_limit(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionCache;
    use kvstore::MemDb;

    fn repo() -> Repo {
        Repo::new(std::env::temp_dir(), Box::new(MemDb::new()), 0)
    }

    fn session_with_mode(mode: u32) -> Session {
        let cache = SessionCache::new();
        Session::create(&cache, 1, [0u8; 32], 7, mode).unwrap()
    }

    async fn seed_file(repo: &Repo, file_id: u64, uri: &str, hash: &str, ty: &str, size: u64) {
        let mut txn = repo.db().begin(TxnMode::ReadWrite).await.unwrap();
        txn.put(keys::file_by_id_key(file_id), keys::file_by_id_val(hash, ty, size), false).await.unwrap();
        txn.put(keys::uri_and_file_id_key(uri, file_id), Vec::new(), false).await.unwrap();
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn read_without_capability_is_denied() {
        let repo = repo();
        let session = session_with_mode(crate::mode::MODE_WRITE);
        let err = get_file_info(&repo, &session, "hash://sha256/anything").await.unwrap_err();
        assert!(matches!(err, EfsError::CapabilityDenied));
    }

    #[tokio::test]
    async fn get_file_info_resolves_indexed_uri() {
        let repo = repo();
        let session = session_with_mode(MODE_READ);
        seed_file(&repo, 1, "hash://sha256/deadbeef", "deadbeef", "text/plain", 6).await;

        let info = get_file_info(&repo, &session, "hash://sha256/deadbeef").await.unwrap();
        assert_eq!(info.internal_hash, "deadbeef");
        assert_eq!(info.size, 6);
        assert!(info.path.ends_with("blobs/de/ad/deadbeef"));
    }

    #[tokio::test]
    async fn get_file_info_miss_is_not_found() {
        let repo = repo();
        let session = session_with_mode(MODE_READ);
        let err = get_file_info(&repo, &session, "hash://sha256/never-seen").await.unwrap_err();
        assert!(matches!(err, EfsError::NotFound));
    }

    #[tokio::test]
    async fn copy_filtered_uris_applies_filter_and_max() {
        let repo = repo();
        let session = session_with_mode(MODE_READ);
        seed_file(&repo, 1, "hash://sha256/aaa", "aaa", "text/plain", 1).await;
        seed_file(&repo, 2, "hash://sha256/bbb", "bbb", "text/plain", 1).await;
        seed_file(&repo, 3, "file:///other", "ccc", "text/plain", 1).await;

        let filter = |uri: &str| uri.starts_with("hash://");
        let uris = copy_filtered_uris(&repo, &session, &filter, 10).await.unwrap();
        assert_eq!(uris.len(), 2);
        assert!(uris.iter().all(|u| u.starts_with("hash://")));
    }

    #[tokio::test]
    async fn get_value_for_field_truncates_on_a_char_boundary() {
        let repo = repo();
        let session = session_with_mode(MODE_READ);

        let mut txn = repo.db().begin(TxnMode::ReadWrite).await.unwrap();
        txn.put(keys::target_uri_and_meta_file_id_key("hash://sha256/deadbeef", 1), Vec::new(), false)
            .await
            .unwrap();
        txn.put(keys::meta_file_id_field_and_value_key(1, "title", "h\u{e9}llo"), Vec::new(), false).await.unwrap();
        txn.commit().await.unwrap();

        let value = get_value_for_field(&repo, &session, "hash://sha256/deadbeef", "title", 2).await.unwrap();
        assert_eq!(value, Some("h".to_string()));
    }
}
