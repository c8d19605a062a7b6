//! Top-N ranking of instruments by a numeric metric.
//!
//! Every instrument of a ranking pass is inserted; entries stay sorted
//! descending by metric at all times, so `top(k)` is a plain prefix slice.
//! Ties keep insertion order: a new entry goes after every entry whose metric
//! is greater than or equal to its own.

use crate::types::RankedEntry;

/// Sorted (symbol, metric) list built by repeated insertion.
#[derive(Debug, Clone, Default)]
pub struct RankedTopN {
    entries: Vec<RankedEntry>,
}

impl RankedTopN {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Inserts one entry, keeping descending order and tie stability.
    ///
    /// The position is found by binary search; shifting the tail is O(n),
    /// which is fine for a few hundred instruments.
    pub fn insert(&mut self, symbol: impl Into<String>, metric: f64) {
        let key = order_key(metric);
        let idx = self.entries.partition_point(|e| order_key(e.metric) >= key);

        self.entries.insert(
            idx,
            RankedEntry {
                symbol: symbol.into(),
                metric,
            },
        );
    }

    /// Returns the `k` highest entries without touching the ranking.
    pub fn top(&self, k: usize) -> &[RankedEntry] {
        &self.entries[..k.min(self.entries.len())]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// NaN ranks below every number so the search predicate stays monotone.
fn order_key(metric: f64) -> f64 {
    if metric.is_nan() {
        f64::NEG_INFINITY
    } else {
        metric
    }
}
