use blob_store::{BlobStore, Config};
use tokio::io::AsyncWriteExt;

fn store(root: &std::path::Path) -> BlobStore {
    BlobStore::new(Config::with_root(root.to_path_buf()))
}

#[tokio::test]
async fn new_temp_write_commit_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(dir.path());

    let (path, mut file) = s.new_temp().await.unwrap();
    file.write_all(b"round trip me\n").await.unwrap();
    s.commit(file, &path, "feedface", 14).await.unwrap();

    assert!(!path.exists());
    let bytes = tokio::fs::read(s.internal_path("feedface")).await.unwrap();
    assert_eq!(bytes, b"round trip me\n");
    assert!(s.exists("feedface").await);
}

#[tokio::test]
async fn concurrent_commits_of_the_same_hash_dedup_onto_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(dir.path());

    let (p1, mut f1) = s.new_temp().await.unwrap();
    f1.write_all(b"same bytes").await.unwrap();
    let (p2, mut f2) = s.new_temp().await.unwrap();
    f2.write_all(b"same bytes").await.unwrap();

    let (r1, r2) = tokio::join!(s.commit(f1, &p1, "sharedhash", 10), s.commit(f2, &p2, "sharedhash", 10));
    r1.unwrap();
    r2.unwrap();

    assert!(!p1.exists());
    assert!(!p2.exists());
    assert_eq!(tokio::fs::read(s.internal_path("sharedhash")).await.unwrap(), b"same bytes");
}

#[tokio::test]
async fn abort_leaves_no_temp_file_and_no_committed_blob() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(dir.path());

    let (path, mut file) = s.new_temp().await.unwrap();
    file.write_all(b"never finished").await.unwrap();
    drop(file);
    s.abort(&path).await;

    assert!(!path.exists());
    assert!(!s.exists("whatever").await);
}

#[tokio::test]
async fn fresh_store_over_an_existing_root_sees_previously_committed_blobs() {
    let dir = tempfile::tempdir().unwrap();
    let s1 = store(dir.path());
    let (path, mut file) = s1.new_temp().await.unwrap();
    file.write_all(b"persisted").await.unwrap();
    s1.commit(file, &path, "cafebabe", 9).await.unwrap();

    let s2 = store(dir.path());
    assert!(s2.exists("cafebabe").await);
    assert_eq!(tokio::fs::read(s2.internal_path("cafebabe")).await.unwrap(), b"persisted");
}
