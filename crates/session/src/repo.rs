//! Repo (component G): the top-level registry a `Session` and the
//! submission/index pipeline sit on — repository root, KV handle,
//! registration mode, session cache, and commit notifier.

use std::path::{Path, PathBuf};

use blob_store::BlobStore;
use kvstore::Db;
use tokio::sync::watch;

use crate::mode::Mode;
use crate::session::SessionCache;

/// Owns everything the submission and query paths need that isn't passed
/// in explicitly per call: the blob store, the KV database handle, the
/// registration mode, the session cache, and a high-water-mark notifier
/// that `index::store_batch` callers publish to after each committed
/// batch so replication/query listeners (outside this crate's scope) can
/// advance.
pub struct Repo {
    root: PathBuf,
    blobs: BlobStore,
    db: Box<dyn Db>,
    registration_mode: Mode,
    session_cache: SessionCache,
    sort_id_tx: watch::Sender<u64>,
    sort_id_rx: watch::Receiver<u64>,
}

impl Repo {
    /// Open a repo rooted at `root`, backed by `db`, with the given
    /// registration mode.
    #[must_use]
    pub fn new(root: PathBuf, db: Box<dyn Db>, registration_mode: Mode) -> Self {
        let blobs = BlobStore::new(blob_store::Config::with_root(root.clone()));
        let (sort_id_tx, sort_id_rx) = watch::channel(0u64);
        Self { root, blobs, db, registration_mode, session_cache: SessionCache::new(), sort_id_tx, sort_id_rx }
    }

    /// The repository root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The repo's blob store.
    #[must_use]
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// The repo's KV database handle.
    #[must_use]
    pub fn db(&self) -> &dyn Db {
        self.db.as_ref()
    }

    /// Whether (and with what default mode bits) new users may register.
    /// Zero means registration is closed.
    #[must_use]
    pub fn registration_mode(&self) -> Mode {
        self.registration_mode
    }

    /// The repo's injected session cache.
    #[must_use]
    pub fn session_cache(&self) -> &SessionCache {
        &self.session_cache
    }

    /// Subscribe to the repo's monotonic high-water-mark notifier.
    #[must_use]
    pub fn subscribe_sort_id(&self) -> watch::Receiver<u64> {
        self.sort_id_rx.clone()
    }

    /// Publish a new high-water mark after a successful `index::store_batch`
    /// commit. A value not greater than the current mark is ignored, since
    /// the mark must be strictly non-decreasing.
    pub fn publish_sort_id(&self, sort_id: u64) {
        self.sort_id_tx.send_if_modified(|current| {
            if sort_id > *current {
                *current = sort_id;
                true
            } else {
                false
            }
        });
    }
}
