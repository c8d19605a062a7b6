use serde::Deserialize;

use market::{Instrument, OrderBookLevel, OrderBookSnapshot};

use crate::exchange::errors::ExchangeError;

#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub quote_asset: String,
}

impl SymbolInfo {
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }
}

impl From<SymbolInfo> for Instrument {
    fn from(s: SymbolInfo) -> Self {
        Instrument {
            symbol: s.symbol,
            quote_asset: s.quote_asset,
        }
    }
}

/// 24h rolling ticker. Fields stay raw; validation happens when ranking.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub quote_volume: Option<String>,
    pub count: Option<i64>,
}

/// Depth payload: levels are `[price, quantity]` decimal strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Depth {
    pub last_update_id: u64,
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
}

impl Depth {
    pub fn into_snapshot(self) -> Result<OrderBookSnapshot, ExchangeError> {
        Ok(OrderBookSnapshot {
            bids: parse_levels(&self.bids)?,
            asks: parse_levels(&self.asks)?,
        })
    }
}

fn parse_levels(raw: &[(String, String)]) -> Result<Vec<OrderBookLevel>, ExchangeError> {
    raw.iter()
        .map(|(price, qty)| {
            let p: f64 = parse_decimal(price)?;
            let q: f64 = parse_decimal(qty)?;

            if p <= 0.0 || q < 0.0 {
                return Err(ExchangeError::InvalidResponse(format!(
                    "book level out of range: [{price}, {qty}]"
                )));
            }

            Ok(OrderBookLevel::new(p, q))
        })
        .collect()
}

fn parse_decimal(raw: &str) -> Result<f64, ExchangeError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ExchangeError::InvalidResponse(format!("not a decimal: {raw:?}")))
}

/// Error body returned alongside non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}
