//! Order-book spread and notional value.
//!
//! All functions are pure. Levels are not assumed to be pre-sorted: best bid
//! and best ask are found by scanning.
//!
//! Notional value covers exactly the levels handed in. Venues cap depth
//! upstream (the `limit` of a depth request), so a notional figure is only as
//! deep as the snapshot it was computed from.

use crate::error::MarketError;
use crate::types::{BookSide, OrderBookLevel, OrderBookSnapshot, SpreadSample};

/// Level with the highest price.
pub fn highest_bid(levels: &[OrderBookLevel]) -> Result<OrderBookLevel, MarketError> {
    levels
        .iter()
        .copied()
        .reduce(|best, l| if l.price > best.price { l } else { best })
        .ok_or(MarketError::EmptyBook {
            side: BookSide::Bid,
        })
}

/// Level with the lowest price.
pub fn lowest_ask(levels: &[OrderBookLevel]) -> Result<OrderBookLevel, MarketError> {
    levels
        .iter()
        .copied()
        .reduce(|best, l| if l.price < best.price { l } else { best })
        .ok_or(MarketError::EmptyBook {
            side: BookSide::Ask,
        })
}

/// `lowest ask - highest bid`. A crossed book yields a negative spread.
pub fn spread(asks: &[OrderBookLevel], bids: &[OrderBookLevel]) -> Result<f64, MarketError> {
    Ok(lowest_ask(asks)?.price - highest_bid(bids)?.price)
}

/// Sum of `price * quantity` over `levels`; zero for no levels.
pub fn notional_value(levels: &[OrderBookLevel]) -> f64 {
    levels.iter().map(|l| l.price * l.quantity).sum()
}

impl OrderBookSnapshot {
    pub fn spread(&self) -> Result<f64, MarketError> {
        spread(&self.asks, &self.bids)
    }

    /// Bid plus ask notional.
    pub fn notional_value(&self) -> f64 {
        notional_value(&self.bids) + notional_value(&self.asks)
    }
}

/// Builds the per-cycle sample for one instrument.
pub fn sample(symbol: &str, book: &OrderBookSnapshot) -> Result<SpreadSample, MarketError> {
    Ok(SpreadSample {
        symbol: symbol.to_string(),
        spread: book.spread()?,
        notional: book.notional_value(),
    })
}
