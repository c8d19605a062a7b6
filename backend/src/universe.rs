//! Instrument universe ranking.
//!
//! Walks every tradable instrument once, pulls its 24h ticker and builds two
//! top-N rankings: quote volume for one quote asset, trade count for another.
//! The volume ranking decides which order books the poller samples.
//!
//! Tickers are requested `concurrency` at a time. Results are consumed in
//! listing order, so ties rank the same way on every pass.

use std::sync::atomic::Ordering;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{info, instrument, warn};

use market::{Instrument, MarketError, RankedTopN, TickerRecord, UniverseRanking};

use crate::exchange::{ExchangeApi, ExchangeError};
use crate::metrics::Counters;

#[derive(Clone, Debug)]
pub struct RankingConfig {
    pub top_n: usize,
    pub volume_quote_asset: String,
    pub trades_quote_asset: String,

    /// Ticker requests in flight during one ranking pass.
    pub concurrency: usize,
}

/// Ranks the venue's instruments.
///
/// Malformed tickers are counted and left out. Any venue error aborts the
/// whole pass; a partial universe is never ranked.
#[instrument(
    skip(exchange, cfg, counters),
    fields(volume_quote = %cfg.volume_quote_asset, trades_quote = %cfg.trades_quote_asset)
)]
pub async fn rank_universe<E>(
    exchange: &E,
    cfg: &RankingConfig,
    counters: &Counters,
) -> Result<UniverseRanking, ExchangeError>
where
    E: ExchangeApi + ?Sized,
{
    let instruments = exchange.list_instruments().await?;
    let listed = instruments.len();

    let wanted: Vec<Instrument> = instruments
        .into_iter()
        .filter(|i| {
            i.quote_asset == cfg.volume_quote_asset || i.quote_asset == cfg.trades_quote_asset
        })
        .collect();

    let tickers: Vec<_> = stream::iter(wanted)
        .map(|inst| async move {
            let raw = exchange.ticker(&inst.symbol).await?;
            Ok::<_, ExchangeError>((inst, raw))
        })
        .buffered(cfg.concurrency.max(1))
        .try_collect()
        .await?;

    let mut by_volume = RankedTopN::new();
    let mut by_trades = RankedTopN::new();

    for (inst, raw) in &tickers {
        let ticker = match TickerRecord::from_raw(
            &inst.symbol,
            raw.quote_volume.as_deref(),
            raw.count,
        ) {
            Ok(t) => t,
            Err(e @ MarketError::MalformedRecord { .. }) => {
                counters.malformed_tickers.fetch_add(1, Ordering::Relaxed);
                warn!(symbol = %inst.symbol, error = %e, "skipping malformed ticker");
                continue;
            }
            Err(e) => {
                warn!(symbol = %inst.symbol, error = %e, "skipping ticker");
                continue;
            }
        };

        if inst.quote_asset == cfg.volume_quote_asset {
            by_volume.insert(ticker.symbol.clone(), ticker.quote_volume);
        }
        if inst.quote_asset == cfg.trades_quote_asset {
            by_trades.insert(ticker.symbol, ticker.trade_count as f64);
        }
    }

    let ranking = UniverseRanking {
        by_volume: by_volume.top(cfg.top_n).to_vec(),
        by_trades: by_trades.top(cfg.top_n).to_vec(),
    };

    info!(
        instruments = listed,
        tickers = tickers.len(),
        volume_ranked = by_volume.len(),
        trades_ranked = by_trades.len(),
        "universe ranked"
    );

    for (rank, e) in ranking.by_volume.iter().enumerate() {
        info!(
            rank = rank + 1,
            symbol = %e.symbol,
            quote_volume = e.metric,
            quote_asset = %cfg.volume_quote_asset,
            "top by 24h volume"
        );
    }
    for (rank, e) in ranking.by_trades.iter().enumerate() {
        info!(
            rank = rank + 1,
            symbol = %e.symbol,
            trades = e.metric as i64,
            quote_asset = %cfg.trades_quote_asset,
            "top by 24h trade count"
        );
    }

    Ok(ranking)
}
