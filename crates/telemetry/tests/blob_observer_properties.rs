#![cfg(feature = "otel")]

use blob_store::{set_observer, BlobStore, Config};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use telemetry::blob_observer::{global as blob_global, snapshot_counters};
use tokio::io::AsyncWriteExt;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_dir() -> PathBuf {
    let base = std::env::temp_dir();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let p = base.join(format!("earthfs_blob_obs_prop_{}_{}", std::process::id(), id));
    let _ = fs::remove_dir_all(&p);
    fs::create_dir_all(&p).unwrap();
    p
}

#[tokio::test]
async fn committed_bytes_accumulate_across_sizes() {
    set_observer(blob_global());

    for size in [0usize, 1, 1024, 4096, 1024 * 1024] {
        let before = snapshot_counters().0;

        let dir = unique_dir();
        let store = BlobStore::new(Config::with_root(dir.clone()));
        let data = vec![7u8; size];
        let hash = format!("hash-of-size-{size}");

        let (temp_path, mut file) = store.new_temp().await.unwrap();
        file.write_all(&data).await.unwrap();
        store.commit(file, &temp_path, &hash, data.len() as u64).await.unwrap();

        let after = snapshot_counters().0;
        assert!(after.saturating_sub(before) >= size as u64);

        let _ = fs::remove_dir_all(&dir);
    }
}
