//! Index Writer (component E): the single operation `store_batch`, which
//! atomically commits a batch of filed submissions' file records, URI
//! forward/reverse indexes, and meta-file records against the KV store.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use blob_store::BlobStore;
use efs_core::{meta_type, ContentUri, EfsError, Result};
use kvstore::{keys, Db, PutOutcome, Table, Txn, TxnMode};
use submission::Submission;

/// Commit a batch of `Filed` submissions in one read-write transaction, in
/// input order. All submissions must belong to the repository backing `db`
/// and `blobs`.
///
/// Per submission: allocate a file id candidate, no-overwrite insert
/// `(internalHash, type) -> fileID` (reusing the existing id on a
/// collision — deduplication), insert every URI's forward and reverse
/// index pair, and, if the submission's declared type is the meta type,
/// parse its committed body and insert the meta-file's target-URI and
/// field/value records.
///
/// On any per-submission error the transaction is aborted; no partial
/// state is observable. On success the transaction is committed and the
/// batch's maximum meta-file id is returned (`0` if no submission in the
/// batch was a meta-file), ready to be published to the repo's notifier.
pub async fn store_batch(db: &dyn Db, blobs: &BlobStore, submissions: &[Submission]) -> Result<u64> {
    let mut txn = db.begin(TxnMode::ReadWrite).await?;
    let mut max_meta_file_id = 0u64;

    for sub in submissions {
        if let Err(e) = store_one(&mut *txn, blobs, sub, &mut max_meta_file_id).await {
            txn.abort();
            return Err(e);
        }
    }

    txn.commit().await?;
    Ok(max_meta_file_id)
}

async fn store_one(
    txn: &mut dyn Txn,
    blobs: &BlobStore,
    sub: &Submission,
    max_meta_file_id: &mut u64,
) -> Result<()> {
    let internal_hash =
        sub.internal_hash().ok_or(EfsError::InvalidState("submission must be Filed before storeBatch"))?;
    let declared_type = sub.declared_type();
    let size = sub.size().unwrap_or(0);

    let file_id = allocate_or_reuse_file_id(txn, internal_hash, declared_type, size).await?;

    if let Some(uris) = sub.uris() {
        for uri in uris {
            insert_uri_pair(txn, file_id, &uri.to_string()).await?;
        }
    }

    if meta_type::is_meta_type(&meta_type::normalize(declared_type)) {
        commit_meta_file(txn, blobs, internal_hash, file_id).await?;
        if file_id > *max_meta_file_id {
            *max_meta_file_id = file_id;
        }
    }

    Ok(())
}

async fn allocate_or_reuse_file_id(
    txn: &mut dyn Txn,
    internal_hash: &str,
    file_type: &str,
    size: u64,
) -> Result<u64> {
    let candidate = txn.next_id(Table::FileByID).await?;
    let info_key = keys::file_id_by_info_key(internal_hash, file_type);
    let info_val = keys::file_id_val(candidate);

    match txn.put(info_key, info_val, true).await? {
        PutOutcome::Inserted => {
            let rec_key = keys::file_by_id_key(candidate);
            let rec_val = keys::file_by_id_val(internal_hash, file_type, size);
            txn.put(rec_key, rec_val, false).await?;
            Ok(candidate)
        }
        PutOutcome::Existed(existing) => keys::file_id_val_unpack(&existing)
            .ok_or_else(|| EfsError::Transaction("corrupt FileIDByInfo value".into())),
    }
}

async fn insert_uri_pair(txn: &mut dyn Txn, file_id: u64, uri: &str) -> Result<()> {
    let forward = keys::file_id_and_uri_key(file_id, uri);
    txn.put(forward, Vec::new(), true).await?;
    let reverse = keys::uri_and_file_id_key(uri, file_id);
    txn.put(reverse, Vec::new(), true).await?;
    Ok(())
}

async fn commit_meta_file(txn: &mut dyn Txn, blobs: &BlobStore, internal_hash: &str, meta_file_id: u64) -> Result<()> {
    let path = blobs.internal_path(internal_hash);
    let bytes = tokio::fs::read(&path).await.map_err(EfsError::Io)?;
    let body = String::from_utf8(bytes)
        .map_err(|_| EfsError::Transaction("meta-file body is not valid utf-8".into()))?;

    let (target_uri, json) = body
        .split_once("\r\n\r\n")
        .or_else(|| body.split_once("\n\n"))
        .ok_or_else(|| EfsError::Transaction("meta-file body missing target-uri/json separator".into()))?;
    let target_uri = target_uri.trim();
    // The target may reference a URI this repository never itself stored
    // (a meta-file can describe any URI); only shape, not resolvability, is
    // validated here.
    let _ = ContentUri::parse(target_uri);

    let fields: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| EfsError::Transaction(format!("meta-file json: {e}")))?;

    let target_key = keys::target_uri_and_meta_file_id_key(target_uri, meta_file_id);
    txn.put(target_key, Vec::new(), true).await?;

    for (field, value) in &fields {
        let values: Vec<&serde_json::Value> = match value {
            serde_json::Value::Array(vs) => vs.iter().collect(),
            other => vec![other],
        };
        for v in values {
            let value_str = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let key = keys::meta_file_id_field_and_value_key(meta_file_id, field, &value_str);
            txn.put(key, Vec::new(), true).await?;
        }
    }

    Ok(())
}
