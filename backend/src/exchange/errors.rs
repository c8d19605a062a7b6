use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by venue (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("venue returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response from venue: {0}")]
    InvalidResponse(String),

    #[error("invalid api key: {0}")]
    InvalidCredentials(String),
}
