#![cfg(feature = "otel")]

use blob_store::{set_observer, BlobStore, Config};
use std::fs;
use std::path::PathBuf;
use telemetry::blob_observer::{global as blob_global, snapshot_counters};
use tokio::io::AsyncWriteExt;

fn temp_dir_path() -> PathBuf {
    let base = std::env::temp_dir();
    let p = base.join(format!("earthfs_blob_obs_{}", std::process::id()));
    let _ = fs::remove_dir_all(&p);
    fs::create_dir_all(&p).unwrap();
    p
}

#[tokio::test]
async fn registers_observer_and_counts_metrics() {
    set_observer(blob_global());

    let dir = temp_dir_path();
    let store = BlobStore::new(Config::with_root(dir.clone()));

    let data = b"abc".to_vec();
    let (temp_path, mut file) = store.new_temp().await.unwrap();
    file.write_all(&data).await.unwrap();
    store.commit(file, &temp_path, "observedhash", data.len() as u64).await.unwrap();

    let (committed, _deduped) = snapshot_counters();
    assert!(committed >= data.len() as u64);

    // A second commit of the same hash is a dedup, not a new commit.
    let (temp_path2, mut file2) = store.new_temp().await.unwrap();
    file2.write_all(&data).await.unwrap();
    store.commit(file2, &temp_path2, "observedhash", data.len() as u64).await.unwrap();
    let (_committed, deduped) = snapshot_counters();
    assert!(deduped >= 1);

    let _ = fs::remove_dir_all(&dir);
}
