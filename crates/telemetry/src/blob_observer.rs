//! OTel-backed [`BlobStoreObserver`] implementation (feature-gated via
//! `otel`): a counter for committed bytes, a counter for deduplicated
//! commits, and best-effort spans.

use once_cell::sync::OnceCell;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter, Unit};
use opentelemetry::KeyValue;
use std::sync::atomic::{AtomicU64, Ordering};

use ::blob_store::{BlobSpan, BlobStoreObserver};

struct Instruments {
    committed_bytes: Counter<u64>,
    deduplicated_count: Counter<u64>,
}

static INSTR: OnceCell<Instruments> = OnceCell::new();
static INSTANCE: OnceCell<OtelBlobObserver> = OnceCell::new();

// Test-visible mirrors so unit tests can assert increments without exporter plumbing.
static COMMITTED_ACC: AtomicU64 = AtomicU64::new(0);
static DEDUP_ACC: AtomicU64 = AtomicU64::new(0);

fn ensure_instruments() -> &'static Instruments {
    INSTR.get_or_init(|| {
        let meter: Meter = global::meter("earthfs.blob_store");
        let committed_bytes = meter
            .u64_counter("blob_store.committed.bytes")
            .with_description("Bytes committed into the blob store")
            .with_unit(Unit::new("By"))
            .init();
        let deduplicated_count = meter
            .u64_counter("blob_store.deduplicated.count")
            .with_description("Commits that found an existing blob already in place")
            .init();
        Instruments { committed_bytes, deduplicated_count }
    })
}

/// OTel-backed blob store observer.
#[derive(Clone, Copy)]
pub struct OtelBlobObserver;

impl BlobStoreObserver for OtelBlobObserver {
    fn committed(&self, internal_hash: &str, bytes: u64) {
        let inst = ensure_instruments();
        inst.committed_bytes.add(bytes, &[KeyValue::new("internal_hash", internal_hash.to_owned())]);
        let _ = COMMITTED_ACC.fetch_add(bytes, Ordering::Relaxed);
    }

    fn deduplicated(&self, internal_hash: &str) {
        let inst = ensure_instruments();
        inst.deduplicated_count.add(1, &[KeyValue::new("internal_hash", internal_hash.to_owned())]);
        let _ = DEDUP_ACC.fetch_add(1, Ordering::Relaxed);
    }

    fn span(&self, name: &'static str) -> BlobSpan {
        let span = tracing::span!(tracing::Level::INFO, "blob_store", op = name);
        let entered = span.entered();
        BlobSpan::from_guard(entered)
    }
}

/// A global `&'static` instance suitable for `blob_store::set_observer()`.
pub fn global() -> &'static OtelBlobObserver {
    INSTANCE.get_or_init(|| {
        let _ = ensure_instruments();
        OtelBlobObserver
    })
}

/// Snapshot the test-visible counter mirrors (for integration tests).
pub fn snapshot_counters() -> (u64, u64) {
    (COMMITTED_ACC.load(Ordering::Relaxed), DEDUP_ACC.load(Ordering::Relaxed))
}
