use async_trait::async_trait;

use crate::{DailySeries, IntradaySeries, MarketError, PredictionMap, SentimentResult};

/// Trait for market-data providers (price history).
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    async fn fetch_daily(&self, symbol: &str, api_key: &str) -> Result<DailySeries, MarketError>;

    /// `month` selects a historical `YYYY-MM` window; `None` returns the
    /// latest bars.
    async fn fetch_intraday(
        &self,
        symbol: &str,
        interval: &str,
        month: Option<&str>,
        api_key: &str,
    ) -> Result<IntradaySeries, MarketError>;
}

/// Trait for N-day price forecast services.
#[async_trait]
pub trait ForecastPort: Send + Sync {
    async fn predict(&self, symbol: &str, horizon: u32) -> Result<PredictionMap, MarketError>;
}

/// Trait for news-sentiment classifiers. `Ok(None)` means the upstream
/// answered but produced no usable classification.
#[async_trait]
pub trait SentimentPort: Send + Sync {
    async fn analyze(&self, symbol: &str) -> Result<Option<SentimentResult>, MarketError>;
}

/// Source of the market-data API credential. Implementations resolve it
/// once at startup; the orchestrator consults it only when a refresh is
/// actually required.
pub trait CredentialProvider: Send + Sync {
    fn api_key(&self) -> Option<String>;
}
