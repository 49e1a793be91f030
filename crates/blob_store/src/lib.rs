//! Blob Store (component A): temp-file staging, fsync, and hard-link into
//! place under the blob's internal hash.
//!
//! Blobs are content-addressed and write-once: two submissions of
//! identical bytes converge on the same on-disk path, and a second
//! `commit` of the same internal hash is a successful no-op (`EEXIST`),
//! which is how concurrent duplicate submissions race safely onto one
//! file. There is no compression or encryption-at-rest here: bytes are
//! stored exactly as submitted so they can be read back by hash alone.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io;

/// Errors a [`BlobStore`] can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error that isn't a recoverable `EEXIST`/`ENOENT` case.
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Blob store configuration: the repository-relative root directory under
/// which `tmp/` and `blobs/` live.
#[derive(Clone, Debug)]
pub struct Config {
    /// Root directory for this repository's blob store.
    pub root: PathBuf,
}

impl Config {
    /// Build a config rooted at `root`.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }
}

/// Optional observability hooks (low-cardinality counters and spans). By
/// default these are no-ops; a host binary may register a global observer
/// to emit metrics/traces via whatever backend it wires up.
pub trait BlobStoreObserver: Send + Sync {
    /// A temp file was committed into place under `internal_hash`.
    fn committed(&self, _internal_hash: &str, _bytes: u64) {}
    /// A commit found the target already present (deduplicated).
    fn deduplicated(&self, _internal_hash: &str) {}
    /// Start an optional span; dropping ends it.
    fn span(&self, _name: &'static str) -> BlobSpan {
        BlobSpan::noop()
    }
}

/// Guard object for optional spans. Holds a type-erased guard that exits on
/// drop.
pub struct BlobSpan {
    _guard: Option<Box<dyn Any + 'static>>,
}

impl BlobSpan {
    /// Create a no-op span guard.
    #[must_use]
    pub fn noop() -> Self {
        Self { _guard: None }
    }

    /// Create a span guard from an arbitrary guard object; dropping this
    /// will drop the guard.
    pub fn from_guard<G: 'static>(guard: G) -> Self {
        Self { _guard: Some(Box::new(guard)) }
    }
}

struct NoopObserver;
impl BlobStoreObserver for NoopObserver {}

static NOOP_OBSERVER: NoopObserver = NoopObserver;
static OBSERVER: OnceLock<&'static dyn BlobStoreObserver> = OnceLock::new();

/// Register a global observer for blob store metrics/spans (optional). Safe
/// to call at most once; subsequent calls are ignored.
pub fn set_observer(observer: &'static dyn BlobStoreObserver) {
    let _ = OBSERVER.set(observer);
}

fn observer() -> &'static dyn BlobStoreObserver {
    OBSERVER.get().copied().unwrap_or(&NOOP_OBSERVER)
}

/// Temp-file-then-link content-addressed blob storage.
#[derive(Clone, Debug)]
pub struct BlobStore {
    cfg: Config,
}

fn is_not_found(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound
}

fn is_exists(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::AlreadyExists
}

impl BlobStore {
    /// Construct a store rooted at `cfg.root`. Does not create any
    /// directories eagerly; they are created on demand by `new_temp` and
    /// `commit`.
    #[must_use]
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    /// The canonical on-disk path for a committed blob, sharded by the
    /// first two and next two hex characters of its internal hash.
    #[must_use]
    pub fn internal_path(&self, internal_hash: &str) -> PathBuf {
        let a = &internal_hash[0..2.min(internal_hash.len())];
        let b = &internal_hash[2.min(internal_hash.len())..4.min(internal_hash.len())];
        self.cfg.root.join("blobs").join(a).join(b).join(internal_hash)
    }

    fn temp_dir(&self) -> PathBuf {
        self.cfg.root.join("tmp")
    }

    /// Create a fresh temp file: mode 0400, create-exclusive-truncate,
    /// write-only. If the temp directory doesn't exist yet it is created
    /// recursively and the open retried exactly once.
    pub async fn new_temp(&self) -> Result<(PathBuf, File), Error> {
        let dir = self.temp_dir();
        let path = dir.join(format!("{}.tmp", temp_name()));
        match open_temp(&path).await {
            Ok(file) => Ok((path, file)),
            Err(e) if is_not_found(&e) => {
                fs::create_dir_all(&dir).await?;
                let file = open_temp(&path).await?;
                Ok((path, file))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fsync and close an open temp file. Split out from [`BlobStore::link`]
    /// so a pipeline stage that already owns the open handle (the
    /// submission's `end` step) can finalize it without reopening, and a
    /// later stage holding only the path can perform the link.
    pub async fn sync_and_close(&self, file: File) -> Result<(), Error> {
        file.sync_all().await?;
        drop(file);
        Ok(())
    }

    /// Hard-link `temp_path` (already fsynced and closed) to its canonical
    /// internal path for `internal_hash`. `EEXIST` on the link is treated
    /// as success (deduplication: another submission of the same content
    /// already won the race). On success the temp file is unlinked.
    pub async fn link(&self, temp_path: &Path, internal_hash: &str, size: u64) -> Result<(), Error> {
        let _span = observer().span("blob_store.link");
        let final_path = self.internal_path(internal_hash);
        match link_retrying(temp_path, &final_path).await {
            Ok(()) => observer().committed(internal_hash, size),
            Err(LinkOutcome::AlreadyExists) => observer().deduplicated(internal_hash),
            Err(LinkOutcome::Io(e)) => return Err(e.into()),
        }

        let _ = fs::remove_file(temp_path).await;
        Ok(())
    }

    /// Fsync and close `file`, then hard-link `temp_path` into place.
    /// Convenience composition of [`BlobStore::sync_and_close`] and
    /// [`BlobStore::link`] for callers that hold the open file right up to
    /// commit time.
    pub async fn commit(&self, file: File, temp_path: &Path, internal_hash: &str, size: u64) -> Result<(), Error> {
        self.sync_and_close(file).await?;
        self.link(temp_path, internal_hash, size).await
    }

    /// Unconditionally unlink the temp file. Used to clean up a submission
    /// that failed before reaching `commit`.
    pub async fn abort(&self, temp_path: &Path) {
        let _ = fs::remove_file(temp_path).await;
    }

    /// Return true if a blob with this internal hash is present.
    pub async fn exists(&self, internal_hash: &str) -> bool {
        fs::metadata(self.internal_path(internal_hash)).await.is_ok()
    }
}

enum LinkOutcome {
    AlreadyExists,
    Io(io::Error),
}

async fn link_retrying(temp_path: &Path, final_path: &Path) -> Result<(), LinkOutcome> {
    match fs::hard_link(temp_path, final_path).await {
        Ok(()) => Ok(()),
        Err(e) if is_exists(&e) => Err(LinkOutcome::AlreadyExists),
        Err(e) if is_not_found(&e) => {
            if let Some(parent) = final_path.parent() {
                fs::create_dir_all(parent).await.map_err(LinkOutcome::Io)?;
            }
            match fs::hard_link(temp_path, final_path).await {
                Ok(()) => Ok(()),
                Err(e) if is_exists(&e) => Err(LinkOutcome::AlreadyExists),
                Err(e) => Err(LinkOutcome::Io(e)),
            }
        }
        Err(e) => Err(LinkOutcome::Io(e)),
    }
}

async fn open_temp(path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create_new(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o400);
    }
    opts.open(path).await
}

fn temp_name() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{nanos:x}-{n:x}-{:x}", std::process::id())
}
