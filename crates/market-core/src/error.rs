use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing ALPHAVANTAGE_API_KEY (set the env var or API_KEY_FALLBACK)")]
    MissingCredential,

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Forecast service error: {0}")]
    Forecast(String),

    #[error("Forecast service returned empty predictions")]
    EmptyForecast,

    #[error("Sentiment service error: {0}")]
    Sentiment(String),

    #[error("Sentiment service returned null result")]
    NullSentiment,

    #[error("Cache deserialization error: {0}")]
    Deserialization(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl MarketError {
    /// True for failures the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, MarketError::InvalidInput(_))
    }
}
