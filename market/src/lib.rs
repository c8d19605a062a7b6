//! Market analytics core.
//!
//! Pure, I/O-free building blocks used by the polling service:
//! - `ranking`  → bounded top-N selection by volume or trade count
//! - `book`     → best bid/ask, spread and notional value of an order book
//! - `delta`    → cycle-over-cycle spread deltas keyed by symbol
//!
//! Fetching, scheduling and exposition live in the service crate.

pub mod book;
pub mod delta;
pub mod error;
pub mod ranking;
pub mod types;

pub use delta::{DeltaBatch, DeltaTracker};
pub use error::MarketError;
pub use ranking::RankedTopN;
pub use types::*;
