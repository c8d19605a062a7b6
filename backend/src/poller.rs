//! Spread Poller
//!
//! Drives the fixed-period sampling cycle:
//!
//! ```text
//! IDLE → [RANK] → FETCH → COMPUTE → COMPARE → PUBLISH → IDLE
//! ```
//!
//! - RANK: only when due. Ranks the instrument universe and adopts the volume
//!   top-N as the tracked set. Bounded by `rank_timeout`, which is sized for a
//!   full universe pass rather than one cycle's book fetch.
//! - FETCH: pull one order book per tracked symbol, bounded by
//!   `fetch_timeout`.
//! - COMPUTE: spread + notional per book. A one-sided book skips only that
//!   instrument.
//! - COMPARE: key-based deltas against the previous cycle.
//! - PUBLISH: atomically swap in the new snapshot.
//!
//! Cycles run inline on one task, so they never overlap; ticks missed while a
//! cycle overruns are skipped. A failed RANK or FETCH aborts the cycle before
//! anything is compared or published: the previous snapshot stays served and
//! the delta history is untouched. A failed RANK also keeps the previous
//! tracked set.
//!
//! The phase being executed is recorded on the cycle span, so every log line
//! of a cycle carries it, and a `CycleError` names the phase that failed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval, timeout};
use tracing::{Instrument, Span, debug, error, info, warn};

use market::{
    DeltaBatch, DeltaTracker, MarketError, OrderBookSnapshot, SpreadSample, UniverseRanking,
    book,
};

use crate::error::CycleError;
use crate::exchange::{ExchangeApi, ExchangeError};
use crate::logger::{TraceId, cycle_span, warn_if_slow};
use crate::metrics::{Counters, SnapshotStore};
use crate::universe::{RankingConfig, rank_universe};

#[derive(Clone, Debug)]
pub struct PollerConfig {
    pub period: Duration,
    pub fetch_timeout: Duration,
    pub rank_timeout: Duration,
    pub rerank_every_cycles: u64,
    pub ranking: RankingConfig,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CyclePhase {
    #[default]
    Idle,
    Rank,
    Fetch,
    Compute,
    Compare,
    Publish,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Rank => "rank",
            CyclePhase::Fetch => "fetch",
            CyclePhase::Compute => "compute",
            CyclePhase::Compare => "compare",
            CyclePhase::Publish => "publish",
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one successful cycle did.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,

    /// The universe was ranked during this cycle.
    pub reranked: bool,

    /// First comparison-less cycle; the published snapshot is empty.
    pub baseline: bool,

    /// Records in the published snapshot.
    pub published: usize,

    /// Instruments left out because one side of their book was empty.
    pub empty_books: usize,
}

pub struct SpreadPoller<E: ?Sized> {
    exchange: Arc<E>,
    cfg: PollerConfig,
    tracker: DeltaTracker,
    snapshots: SnapshotStore,
    counters: Counters,

    /// Symbols whose books are sampled (volume top-N of the last ranking).
    tracked: Vec<String>,
    cycles_since_rank: u64,
    cycle: u64,
}

impl<E> SpreadPoller<E>
where
    E: ExchangeApi + ?Sized,
{
    pub fn new(
        exchange: Arc<E>,
        cfg: PollerConfig,
        snapshots: SnapshotStore,
        counters: Counters,
    ) -> Self {
        Self {
            exchange,
            cfg,
            tracker: DeltaTracker::new(),
            snapshots,
            counters,
            tracked: Vec::new(),
            cycles_since_rank: 0,
            cycle: 0,
        }
    }

    pub fn tracked_symbols(&self) -> &[String] {
        &self.tracked
    }

    /// Runs cycles forever at the configured period.
    pub async fn run(mut self) {
        let period = self.cfg.period;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            every_ms = period.as_millis() as u64,
            fetch_timeout_ms = self.cfg.fetch_timeout.as_millis() as u64,
            rank_timeout_ms = self.cfg.rank_timeout.as_millis() as u64,
            top_n = self.cfg.ranking.top_n,
            "spread poller started"
        );

        loop {
            ticker.tick().await;

            let started = Instant::now();
            let span = cycle_span(self.cycle + 1, &TraceId::default());

            // Errors are logged inside the cycle; the loop only keeps time.
            let _ = warn_if_slow("poll_cycle", period, self.run_cycle().instrument(span)).await;

            let elapsed = started.elapsed();
            if elapsed > period {
                let skipped = (elapsed.as_nanos() / period.as_nanos()) as u64;
                self.counters
                    .skipped_ticks
                    .fetch_add(skipped, Ordering::Relaxed);
                debug!(skipped, "cycle overran period; ticks skipped");
            }
        }
    }

    /// Executes one full cycle. On error nothing is published.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.cycle += 1;

        // ---- RANK ----
        let reranked = self.rank_due();
        if reranked {
            enter(CyclePhase::Rank);
            let rank_timeout = self.cfg.rank_timeout;
            let outcome = timeout(
                rank_timeout,
                rank_universe(self.exchange.as_ref(), &self.cfg.ranking, &self.counters),
            )
            .await;

            let ranking = match outcome {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => return Err(self.abort(CycleError::exchange(CyclePhase::Rank, e))),
                Err(_) => {
                    return Err(self.abort(CycleError::timeout(CyclePhase::Rank, rank_timeout)));
                }
            };
            self.adopt(ranking);
        }

        // ---- FETCH ----
        enter(CyclePhase::Fetch);
        let fetch_timeout = self.cfg.fetch_timeout;
        let outcome = timeout(fetch_timeout, self.fetch_books()).await;
        let books = match outcome {
            Ok(Ok(b)) => b,
            Ok(Err(e)) => return Err(self.abort(CycleError::exchange(CyclePhase::Fetch, e))),
            Err(_) => {
                return Err(self.abort(CycleError::timeout(CyclePhase::Fetch, fetch_timeout)));
            }
        };

        // ---- COMPUTE ----
        enter(CyclePhase::Compute);
        let (samples, empty_books) = self.compute(&books);

        // ---- COMPARE ----
        enter(CyclePhase::Compare);
        let batch = self.tracker.update(&samples);
        let baseline = batch.is_baseline();
        log_batch(&batch);

        // ---- PUBLISH ----
        enter(CyclePhase::Publish);
        let snapshot = self.snapshots.publish(batch.into_records());

        enter(CyclePhase::Idle);
        self.cycles_since_rank += 1;
        self.counters.cycles_ok.fetch_add(1, Ordering::Relaxed);
        Span::current().record("outcome", "ok");

        info!(
            records = snapshot.records.len(),
            empty_books,
            baseline,
            "snapshot published"
        );

        Ok(CycleReport {
            cycle: self.cycle,
            reranked,
            baseline,
            published: snapshot.records.len(),
            empty_books,
        })
    }

    fn rank_due(&self) -> bool {
        self.tracked.is_empty()
            || (self.cfg.rerank_every_cycles > 0
                && self.cycles_since_rank >= self.cfg.rerank_every_cycles)
    }

    fn adopt(&mut self, ranking: UniverseRanking) {
        self.tracked = ranking.tracked_symbols();
        self.cycles_since_rank = 0;
        info!(symbols = ?self.tracked, "tracked symbols updated");
    }

    async fn fetch_books(&self) -> Result<Vec<(String, OrderBookSnapshot)>, ExchangeError> {
        let mut books = Vec::with_capacity(self.tracked.len());
        for symbol in &self.tracked {
            let book = self.exchange.order_book(symbol).await?;
            books.push((symbol.clone(), book));
        }
        Ok(books)
    }

    fn compute(&self, books: &[(String, OrderBookSnapshot)]) -> (Vec<SpreadSample>, usize) {
        let mut samples = Vec::with_capacity(books.len());
        let mut empty = 0;

        for (symbol, ob) in books {
            match book::sample(symbol, ob) {
                Ok(s) => {
                    info!(
                        symbol = %s.symbol,
                        spread = s.spread,
                        notional = s.notional,
                        bid_levels = ob.bids.len(),
                        ask_levels = ob.asks.len(),
                        "book sampled"
                    );
                    samples.push(s);
                }
                Err(e @ MarketError::EmptyBook { .. }) => {
                    empty += 1;
                    self.counters.empty_books.fetch_add(1, Ordering::Relaxed);
                    warn!(symbol = %symbol, error = %e, "skipping instrument for this cycle");
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "skipping instrument for this cycle");
                }
            }
        }

        (samples, empty)
    }

    fn abort(&mut self, err: CycleError) -> CycleError {
        enter(CyclePhase::Idle);
        self.counters.cycles_failed.fetch_add(1, Ordering::Relaxed);
        Span::current().record("outcome", "failed");

        error!(phase = %err.phase(), error = %err, "cycle aborted; serving previous snapshot");
        err
    }
}

/// Records the phase on the enclosing cycle span.
fn enter(phase: CyclePhase) {
    Span::current().record("phase", phase.as_str());
}

fn log_batch(batch: &DeltaBatch) {
    match batch {
        DeltaBatch::Baseline => info!("first samples stored; deltas start next cycle"),
        DeltaBatch::Compared(records) => {
            for r in records {
                match r.delta {
                    Some(delta) => info!(symbol = %r.symbol, spread = r.spread, delta, "spread"),
                    None => info!(symbol = %r.symbol, spread = r.spread, "spread (no prior value)"),
                }
            }
        }
    }
}
