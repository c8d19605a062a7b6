//! Latest published metrics.
//!
//! The poller builds a complete `MetricsSnapshot` and swaps it in with a single
//! pointer store; scrapes load whichever snapshot is current. Readers never
//! block the poller and never see a half-written record set.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

use market::DeltaRecord;

/// Fully-formed result of one completed polling cycle.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub records: Vec<DeltaRecord>,
    pub generated_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    pub fn new(records: Vec<DeltaRecord>) -> Self {
        Self {
            records,
            generated_at: Utc::now(),
        }
    }

    /// Served until the first cycle publishes.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Shared handle to the snapshot currently served.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<ArcSwap<MetricsSnapshot>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(MetricsSnapshot::empty())),
        }
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the served snapshot. Last write wins.
    pub fn publish(&self, records: Vec<DeltaRecord>) -> Arc<MetricsSnapshot> {
        let snapshot = Arc::new(MetricsSnapshot::new(records));
        self.inner.store(Arc::clone(&snapshot));
        snapshot
    }

    /// Current snapshot; never waits on an in-flight cycle.
    pub fn scrape(&self) -> Arc<MetricsSnapshot> {
        self.inner.load_full()
    }
}
