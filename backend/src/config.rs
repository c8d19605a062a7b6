use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};

use crate::exchange::Credentials;
use crate::poller::PollerConfig;
use crate::universe::RankingConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    // =========================
    // Venue
    // =========================
    /// REST root of the venue, e.g. `https://api.binance.com`.
    pub exchange_base_url: String,

    /// API key / secret. Only the key is sent, and only when present.
    pub credentials: Credentials,

    /// `limit` passed to depth requests.
    ///
    /// Notional values are computed over exactly this many levels per side,
    /// so changing it changes what "notional" means.
    pub book_depth: u32,

    // =========================
    // Polling
    // =========================
    /// Fixed cycle period. Overrunning cycles skip ticks, they never overlap.
    pub poll_interval: Duration,

    /// Upper bound on the FETCH phase of one cycle.
    ///
    /// Expiry aborts the cycle like any other fetch failure: nothing is
    /// published and the previous snapshot keeps being served.
    pub fetch_timeout: Duration,

    /// Upper bound on one ranking pass over the whole instrument universe.
    ///
    /// Kept apart from `fetch_timeout`: a ranking pass issues one ticker
    /// request per candidate instrument and takes far longer than a cycle's
    /// book fetch.
    pub rank_timeout: Duration,

    /// Ticker requests in flight during a ranking pass.
    pub rank_concurrency: usize,

    /// Re-rank the instrument universe every N successful cycles.
    /// `0` ranks once and keeps the symbol set for the lifetime of the process.
    pub rerank_every_cycles: u64,

    // =========================
    // Ranking
    // =========================
    /// Size of both top-N lists; the volume list is the tracked symbol set.
    pub top_n: usize,

    /// Quote asset of instruments ranked by 24h quote volume.
    pub volume_quote_asset: String,

    /// Quote asset of instruments ranked by 24h trade count.
    pub trades_quote_asset: String,

    // =========================
    // Exposition
    // =========================
    pub http_port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key → value source. Unset keys take defaults;
    /// set-but-invalid keys are an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cfg = Self {
            exchange_base_url: lookup("EXCHANGE_BASE_URL")
                .unwrap_or_else(|| "https://api.binance.com".to_string()),
            credentials: Credentials {
                api_key: lookup("EXCHANGE_API_KEY").filter(|v| !v.is_empty()),
                api_secret: lookup("EXCHANGE_API_SECRET").filter(|v| !v.is_empty()),
            },
            book_depth: parse_or(&lookup, "BOOK_DEPTH", 100)?,

            poll_interval: Duration::from_secs(parse_or(&lookup, "POLL_INTERVAL_SECS", 10)?),
            fetch_timeout: Duration::from_secs(parse_or(&lookup, "FETCH_TIMEOUT_SECS", 8)?),
            rank_timeout: Duration::from_secs(parse_or(&lookup, "RANK_TIMEOUT_SECS", 120)?),
            rank_concurrency: parse_or(&lookup, "RANK_CONCURRENCY", 16)?,
            rerank_every_cycles: parse_or(&lookup, "RERANK_EVERY_CYCLES", 0)?,

            top_n: parse_or(&lookup, "TOP_N", 5)?,
            volume_quote_asset: lookup("VOLUME_QUOTE_ASSET").unwrap_or_else(|| "BTC".to_string()),
            trades_quote_asset: lookup("TRADES_QUOTE_ASSET")
                .unwrap_or_else(|| "USDT".to_string()),

            http_port: parse_or(&lookup, "HTTP_PORT", 8080)?,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval.is_zero() {
            bail!("POLL_INTERVAL_SECS must be greater than zero");
        }
        if self.fetch_timeout.is_zero() {
            bail!("FETCH_TIMEOUT_SECS must be greater than zero");
        }
        if self.rank_timeout.is_zero() {
            bail!("RANK_TIMEOUT_SECS must be greater than zero");
        }
        if self.rank_concurrency == 0 {
            bail!("RANK_CONCURRENCY must be greater than zero");
        }
        if self.top_n == 0 {
            bail!("TOP_N must be greater than zero");
        }
        if self.book_depth == 0 {
            bail!("BOOK_DEPTH must be greater than zero");
        }
        Ok(())
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            period: self.poll_interval,
            fetch_timeout: self.fetch_timeout,
            rank_timeout: self.rank_timeout,
            rerank_every_cycles: self.rerank_every_cycles,
            ranking: RankingConfig {
                top_n: self.top_n,
                volume_quote_asset: self.volume_quote_asset.clone(),
                trades_quote_asset: self.trades_quote_asset.clone(),
                concurrency: self.rank_concurrency,
            },
        }
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid value {raw:?} for {key}")),
    }
}
