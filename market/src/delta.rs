//! Cycle-over-cycle spread deltas.
//!
//! The tracker keeps exactly one previous sample set (symbol → spread). Each
//! `update` joins the new samples against it by symbol, then replaces it
//! wholesale. Pairing by key means a change in the tracked symbol set can never
//! pair one instrument's spread with another's.
//!
//! Policy for symbol-set drift:
//! - a symbol with no previous sample gets `delta: None`
//! - a symbol that disappeared is dropped along with the old set

use std::collections::HashMap;

use tracing::debug;

use crate::types::{DeltaRecord, SpreadSample};

/// Outcome of one `DeltaTracker::update`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaBatch {
    /// No previous set existed. Samples were stored; nothing to compare yet.
    Baseline,

    /// One record per current sample, in sample order.
    Compared(Vec<DeltaRecord>),
}

impl DeltaBatch {
    pub fn is_baseline(&self) -> bool {
        matches!(self, DeltaBatch::Baseline)
    }

    pub fn records(&self) -> &[DeltaRecord] {
        match self {
            DeltaBatch::Baseline => &[],
            DeltaBatch::Compared(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<DeltaRecord> {
        match self {
            DeltaBatch::Baseline => Vec::new(),
            DeltaBatch::Compared(records) => records,
        }
    }
}

/// Single-slot spread history.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    previous: Option<HashMap<String, f64>>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `current` against the previous cycle and makes it the new
    /// previous cycle.
    pub fn update(&mut self, current: &[SpreadSample]) -> DeltaBatch {
        let next: HashMap<String, f64> = current
            .iter()
            .map(|s| (s.symbol.clone(), s.spread))
            .collect();

        let Some(previous) = self.previous.replace(next) else {
            debug!(samples = current.len(), "delta baseline stored");
            return DeltaBatch::Baseline;
        };

        let records: Vec<DeltaRecord> = current
            .iter()
            .map(|s| DeltaRecord {
                symbol: s.symbol.clone(),
                spread: s.spread,
                delta: previous.get(&s.symbol).map(|prev| (s.spread - prev).abs()),
            })
            .collect();

        let dropped = previous
            .keys()
            .filter(|sym| !current.iter().any(|s| &s.symbol == *sym))
            .count();

        debug!(
            records = records.len(),
            new_symbols = records.iter().filter(|r| r.delta.is_none()).count(),
            dropped_symbols = dropped,
            "spread deltas computed"
        );

        DeltaBatch::Compared(records)
    }

    #[cfg(test)]
    fn previous(&self, symbol: &str) -> Option<f64> {
        self.previous.as_ref()?.get(symbol).copied()
    }
}
