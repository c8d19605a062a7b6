use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use market::{Instrument, OrderBookSnapshot};

use crate::exchange::ExchangeApi;
use crate::exchange::errors::ExchangeError;
use crate::exchange::types::{ApiErrorBody, Depth, ExchangeInfo, Ticker24h};

const API_KEY_HEADER: &str = "x-mbx-apikey";

/// Venue credentials. Public market-data endpoints only need the key.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl Credentials {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .finish()
    }
}

/// REST client for a Binance-compatible spot API.
#[derive(Clone)]
pub struct BinanceClient {
    http: Client,
    url: String,
    book_depth: u32,
}

impl BinanceClient {
    pub fn new(
        url: String,
        credentials: &Credentials,
        book_depth: u32,
    ) -> Result<Self, ExchangeError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &credentials.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|e| ExchangeError::InvalidCredentials(e.to_string()))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            book_depth,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}", self.url, path);
        let resp = self.http.get(&url).query(query).send().await?;
        let status = resp.status();

        // 418 follows repeated 429s (IP ban).
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ExchangeError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(e) => format!("{} (code {})", e.msg, e.code),
                Err(_) => body,
            };
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ExchangeApi for BinanceClient {
    #[instrument(skip(self), level = "debug")]
    async fn list_instruments(&self) -> Result<Vec<Instrument>, ExchangeError> {
        let info: ExchangeInfo = self.get("/api/v3/exchangeInfo", &[]).await?;
        let listed = info.symbols.len();

        let instruments: Vec<Instrument> = info
            .symbols
            .into_iter()
            .filter(|s| s.is_trading())
            .map(Instrument::from)
            .collect();

        debug!(listed, trading = instruments.len(), "exchange info fetched");

        Ok(instruments)
    }

    #[instrument(skip(self), fields(symbol = %symbol), level = "debug")]
    async fn ticker(&self, symbol: &str) -> Result<Ticker24h, ExchangeError> {
        self.get("/api/v3/ticker/24hr", &[("symbol", symbol.to_string())])
            .await
    }

    #[instrument(skip(self), fields(symbol = %symbol), level = "debug")]
    async fn order_book(&self, symbol: &str) -> Result<OrderBookSnapshot, ExchangeError> {
        let depth: Depth = self
            .get(
                "/api/v3/depth",
                &[
                    ("symbol", symbol.to_string()),
                    ("limit", self.book_depth.to_string()),
                ],
            )
            .await?;

        debug!(
            last_update_id = depth.last_update_id,
            bids = depth.bids.len(),
            asks = depth.asks.len(),
            "order book fetched"
        );

        depth.into_snapshot()
    }
}
