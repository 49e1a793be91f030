//! A narrow transactional ordered-KV interface (component H), plus an
//! in-memory reference implementation.
//!
//! This crate treats the underlying store as an abstract, generic KV
//! engine: `begin`, `commit`, `abort`, `get`, `put` (optionally
//! no-overwrite), `scan_prefix` (a materialized cursor range), and
//! `next_id` (a per-table id allocator). A production deployment would
//! back [`Db`] with any ordered KV engine; [`MemDb`] is a correctness
//! reference used by this workspace's tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod keys;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use efs_core::EfsError;
pub use keys::Table;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, EfsError>;

/// Whether a transaction may write.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxnMode {
    /// Read-only: `put`/`next_id` return [`EfsError::CapabilityDenied`].
    ReadOnly,
    /// Read-write: at most one is open against a [`Db`] handle at a time.
    ReadWrite,
}

/// The outcome of a `put`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PutOutcome {
    /// The key was absent and is now set to the new value.
    Inserted,
    /// `no_overwrite` was set and the key already existed; this is the
    /// value that was already stored (not the one the caller attempted to
    /// write), matching the original `db_put`'s by-reference value
    /// out-param on `DB_KEYEXIST`.
    Existed(Vec<u8>),
}

/// A single transaction against a [`Db`]. Every `begin`/`commit`/`abort`,
/// every `put`, and every cursor motion (`scan_prefix`) is a suspension
/// point per the concurrency model.
#[async_trait]
pub trait Txn: Send {
    /// Point lookup.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite `key`. If `no_overwrite` is set and the key is
    /// already present, the existing value is returned and nothing is
    /// written.
    async fn put(&mut self, key: Vec<u8>, value: Vec<u8>, no_overwrite: bool) -> Result<PutOutcome>;

    /// Allocate the next id for `table`'s id namespace.
    async fn next_id(&mut self, table: Table) -> Result<u64>;

    /// Materialize every `(key, value)` pair whose key starts with `prefix`,
    /// in key order. Models a cursor range scan.
    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Commit the transaction, making its writes visible.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Abort the transaction, discarding its writes.
    fn abort(self: Box<Self>);
}

/// A handle to a KV database capable of opening transactions.
#[async_trait]
pub trait Db: Send + Sync {
    /// Open a transaction in the given mode.
    async fn begin(&self, mode: TxnMode) -> Result<Box<dyn Txn>>;
}

#[derive(Clone, Default)]
struct MemState {
    tables: BTreeMap<Vec<u8>, Vec<u8>>,
    id_counters: HashMap<u8, u64>,
}

fn table_index(table: Table) -> u8 {
    // Mirrors the tag ordering in `keys::Table`; kept separate so the id
    // counter namespace doesn't need to know about key encoding.
    match table {
        Table::FileByID => 0,
        Table::FileIDByInfo => 1,
        Table::FileIDAndURI => 2,
        Table::URIAndFileID => 3,
        Table::UserByID => 4,
        Table::UserIDByName => 5,
        Table::TargetURIAndMetaFileID => 6,
        Table::MetaFileIDFieldAndValue => 7,
    }
}

/// An in-memory reference implementation of [`Db`]. Enforces "one
/// read-write transaction per handle at a time" by holding the state mutex
/// for the lifetime of a write transaction; reads take a cheap snapshot.
#[derive(Clone, Default)]
pub struct MemDb {
    state: Arc<Mutex<MemState>>,
}

impl MemDb {
    /// Construct an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Db for MemDb {
    async fn begin(&self, mode: TxnMode) -> Result<Box<dyn Txn>> {
        match mode {
            TxnMode::ReadWrite => {
                let guard = self.state.clone().lock_owned().await;
                let staged = guard.clone();
                Ok(Box::new(MemWriteTxn { guard, staged }))
            }
            TxnMode::ReadOnly => {
                let snapshot = self.state.lock().await.clone();
                Ok(Box::new(MemReadTxn { snapshot }))
            }
        }
    }
}

struct MemWriteTxn {
    guard: OwnedMutexGuard<MemState>,
    staged: MemState,
}

#[async_trait]
impl Txn for MemWriteTxn {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.staged.tables.get(key).cloned())
    }

    async fn put(&mut self, key: Vec<u8>, value: Vec<u8>, no_overwrite: bool) -> Result<PutOutcome> {
        if no_overwrite {
            if let Some(existing) = self.staged.tables.get(&key) {
                return Ok(PutOutcome::Existed(existing.clone()));
            }
        }
        self.staged.tables.insert(key, value);
        Ok(PutOutcome::Inserted)
    }

    async fn next_id(&mut self, table: Table) -> Result<u64> {
        let counter = self.staged.id_counters.entry(table_index(table)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .staged
            .tables
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        *self.guard = std::mem::take(&mut self.staged);
        Ok(())
    }

    fn abort(self: Box<Self>) {
        // Dropping `self` releases the lock without publishing `staged`.
    }
}

struct MemReadTxn {
    snapshot: MemState,
}

#[async_trait]
impl Txn for MemReadTxn {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.snapshot.tables.get(key).cloned())
    }

    async fn put(&mut self, _key: Vec<u8>, _value: Vec<u8>, _no_overwrite: bool) -> Result<PutOutcome> {
        Err(EfsError::CapabilityDenied)
    }

    async fn next_id(&mut self, _table: Table) -> Result<u64> {
        Err(EfsError::CapabilityDenied)
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .snapshot
            .tables
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    fn abort(self: Box<Self>) {}
}
