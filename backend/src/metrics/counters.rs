use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub cycles_ok: Arc<AtomicU64>,
    pub cycles_failed: Arc<AtomicU64>,

    /// Ticks dropped because a cycle overran the period.
    pub skipped_ticks: Arc<AtomicU64>,

    // skip reasons
    pub empty_books: Arc<AtomicU64>,
    pub malformed_tickers: Arc<AtomicU64>,
}

/// Point-in-time copy of `Counters`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterValues {
    pub cycles_ok: u64,
    pub cycles_failed: u64,
    pub skipped_ticks: u64,
    pub empty_books: u64,
    pub malformed_tickers: u64,
}

impl Counters {
    pub fn load(&self) -> CounterValues {
        CounterValues {
            cycles_ok: self.cycles_ok.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            empty_books: self.empty_books.load(Ordering::Relaxed),
            malformed_tickers: self.malformed_tickers.load(Ordering::Relaxed),
        }
    }
}
