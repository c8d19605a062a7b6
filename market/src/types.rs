use std::fmt;

use crate::error::MarketError;

/// Tradable instrument as listed by the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub symbol: String,
    pub quote_asset: String,
}

/// 24h ticker figures for one instrument.
///
/// Produced once per ranking pass and discarded after it has been ranked.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerRecord {
    pub symbol: String,

    /// Traded volume over the last 24h, denominated in the quote asset.
    pub quote_volume: f64,

    /// Number of trades over the last 24h.
    pub trade_count: i64,
}

impl TickerRecord {
    /// Validates raw venue fields into a ticker record.
    ///
    /// Venues report volumes as decimal strings; a missing field, a value that
    /// does not parse, or a negative / non-finite volume is malformed.
    pub fn from_raw(
        symbol: &str,
        quote_volume: Option<&str>,
        trade_count: Option<i64>,
    ) -> Result<Self, MarketError> {
        let raw_volume =
            quote_volume.ok_or_else(|| MarketError::malformed(symbol, "missing quote volume"))?;

        let quote_volume: f64 = raw_volume.trim().parse().map_err(|_| {
            MarketError::malformed(symbol, format!("quote volume {raw_volume:?} is not a number"))
        })?;

        if !quote_volume.is_finite() || quote_volume < 0.0 {
            return Err(MarketError::malformed(
                symbol,
                format!("quote volume {quote_volume} out of range"),
            ));
        }

        let trade_count =
            trade_count.ok_or_else(|| MarketError::malformed(symbol, "missing trade count"))?;

        if trade_count < 0 {
            return Err(MarketError::malformed(
                symbol,
                format!("trade count {trade_count} is negative"),
            ));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            quote_volume,
            trade_count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Bid => f.write_str("bid"),
            BookSide::Ask => f.write_str("ask"),
        }
    }
}

/// Single price level of an order book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderBookLevel {
    pub price: f64,
    pub quantity: f64,
}

impl OrderBookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// Order book as returned by one depth request.
///
/// Either side may be empty; the calculator reports that as `EmptyBook`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBookSnapshot {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

/// Entry of a top-N ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub symbol: String,
    pub metric: f64,
}

/// Spread reading for one instrument in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadSample {
    pub symbol: String,

    /// lowest ask - highest bid. Negative when the book is crossed.
    pub spread: f64,

    /// Combined bid + ask notional of the book the spread was taken from.
    pub notional: f64,
}

/// Spread of one instrument together with its change since the previous cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaRecord {
    pub symbol: String,
    pub spread: f64,

    /// `|spread - previous spread|`, or `None` when the symbol had no sample
    /// in the previous cycle.
    pub delta: Option<f64>,
}

/// Result of one universe ranking pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniverseRanking {
    /// Top instruments by 24h quote volume.
    pub by_volume: Vec<RankedEntry>,

    /// Top instruments by 24h trade count.
    pub by_trades: Vec<RankedEntry>,
}

impl UniverseRanking {
    /// Symbols whose spreads are tracked each cycle.
    pub fn tracked_symbols(&self) -> Vec<String> {
        self.by_volume.iter().map(|e| e.symbol.clone()).collect()
    }
}
