use kvstore::{Db, MemDb, PutOutcome, Table, TxnMode};

#[tokio::test]
async fn one_write_txn_is_isolated_from_concurrent_readers_until_commit() {
    let db = MemDb::new();
    let mut writer = db.begin(TxnMode::ReadWrite).await.unwrap();
    writer.put(b"k".to_vec(), b"v1".to_vec(), false).await.unwrap();

    let reader = db.begin(TxnMode::ReadOnly).await.unwrap();
    assert_eq!(reader.get(b"k").await.unwrap(), None, "uncommitted writes must not be visible");

    writer.commit().await.unwrap();
    let reader2 = db.begin(TxnMode::ReadOnly).await.unwrap();
    assert_eq!(reader2.get(b"k").await.unwrap(), Some(b"v1".to_vec()));
}

#[tokio::test]
async fn scan_prefix_returns_matches_in_key_order() {
    let db = MemDb::new();
    let mut txn = db.begin(TxnMode::ReadWrite).await.unwrap();
    for k in ["a/1", "a/3", "a/2", "b/1"] {
        txn.put(k.as_bytes().to_vec(), b"x".to_vec(), false).await.unwrap();
    }
    txn.commit().await.unwrap();

    let read = db.begin(TxnMode::ReadOnly).await.unwrap();
    let hits = read.scan_prefix(b"a/").await.unwrap();
    let keys: Vec<String> = hits.into_iter().map(|(k, _)| String::from_utf8(k).unwrap()).collect();
    assert_eq!(keys, vec!["a/1", "a/2", "a/3"]);
}

#[tokio::test]
async fn read_only_txn_rejects_writes_and_id_allocation() {
    let db = MemDb::new();
    let mut read = db.begin(TxnMode::ReadOnly).await.unwrap();
    assert!(read.put(b"k".to_vec(), b"v".to_vec(), false).await.is_err());
    assert!(read.next_id(Table::FileByID).await.is_err());
}

#[tokio::test]
async fn no_overwrite_put_preserves_the_first_writer_across_a_commit_boundary() {
    let db = MemDb::new();
    let mut first = db.begin(TxnMode::ReadWrite).await.unwrap();
    first.put(b"k".to_vec(), b"first".to_vec(), true).await.unwrap();
    first.commit().await.unwrap();

    let mut second = db.begin(TxnMode::ReadWrite).await.unwrap();
    let outcome = second.put(b"k".to_vec(), b"second".to_vec(), true).await.unwrap();
    assert_eq!(outcome, PutOutcome::Existed(b"first".to_vec()));
    second.commit().await.unwrap();

    let read = db.begin(TxnMode::ReadOnly).await.unwrap();
    assert_eq!(read.get(b"k").await.unwrap(), Some(b"first".to_vec()));
}
