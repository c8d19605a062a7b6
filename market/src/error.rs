use thiserror::Error;

use crate::types::BookSide;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    /// One side of the book has no levels; spread and notional are undefined.
    #[error("order book has no {side} levels")]
    EmptyBook { side: BookSide },

    /// Ticker data missing or non-numeric.
    #[error("malformed ticker for {symbol}: {reason}")]
    MalformedRecord { symbol: String, reason: String },
}

impl MarketError {
    pub fn malformed(symbol: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}
