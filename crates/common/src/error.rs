use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Terminal connection error: {0}")]
    Connection(String),

    #[error("Candle fetch error: {0}")]
    Fetch(String),

    #[error("Window contains no candles")]
    EmptyWindow,

    #[error("Invalid candle: {0}")]
    InvalidCandle(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Order rejected (code {code}): {description}")]
    OrderRejected { code: i64, description: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors that end the supervisor loop instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
