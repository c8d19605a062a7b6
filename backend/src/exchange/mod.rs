//! Venue access.
//!
//! `ExchangeApi` is the seam between the poller and the trading venue. The
//! production implementation is `BinanceClient` (REST); tests plug in mocks.

pub mod client;
pub mod errors;
pub mod types;

pub use client::{BinanceClient, Credentials};
pub use errors::ExchangeError;
pub use types::Ticker24h;

use async_trait::async_trait;
use market::{Instrument, OrderBookSnapshot};

#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Instruments currently open for trading.
    async fn list_instruments(&self) -> Result<Vec<Instrument>, ExchangeError>;

    /// 24h ticker for one instrument.
    async fn ticker(&self, symbol: &str) -> Result<Ticker24h, ExchangeError>;

    /// Current order book, as deep as the client is configured to request.
    async fn order_book(&self, symbol: &str) -> Result<OrderBookSnapshot, ExchangeError>;
}
