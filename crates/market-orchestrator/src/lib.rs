use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use json_cache::{is_fresh, CacheKind, JsonStore};
use market_core::{
    CombinedPrediction, CredentialProvider, DailySeries, ForecastPort, IntradaySeries,
    MarketDataPort, MarketError, PredictionOutcome, SentimentPort, SentimentRecord,
    SentimentSummary,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

/// Daily history refreshes once a trading day.
pub const DAILY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// News sentiment goes stale much faster than price history.
pub const SENTIMENT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Intraday bars are only briefly useful.
pub const INTRADAY_TTL: Duration = Duration::from_secs(30 * 60);

pub const DEFAULT_SYMBOL: &str = "AMZN";
pub const DEFAULT_HORIZON: u32 = 10;

const SENTIMENT_SOURCE: &str = "sentiment-model";
const INTRADAY_INTERVALS: &[&str] = &["1min", "5min", "15min", "30min", "60min"];

/// Cache-fronted aggregation over the market-data, forecast, and sentiment
/// ports. All upstream access goes through [`fetch_with_cache`], so every
/// artifact kind shares one freshness/refresh path.
pub struct MarketOrchestrator {
    store: JsonStore,
    market_data: Arc<dyn MarketDataPort>,
    forecast: Arc<dyn ForecastPort>,
    sentiment: Arc<dyn SentimentPort>,
    credentials: Arc<dyn CredentialProvider>,
    default_symbol: String,
    daily_ttl: Duration,
    sentiment_ttl: Duration,
    intraday_ttl: Duration,
    /// One guard per cache path; concurrent misses serialize here.
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl MarketOrchestrator {
    pub fn new(
        store: JsonStore,
        market_data: Arc<dyn MarketDataPort>,
        forecast: Arc<dyn ForecastPort>,
        sentiment: Arc<dyn SentimentPort>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            store,
            market_data,
            forecast,
            sentiment,
            credentials,
            default_symbol: DEFAULT_SYMBOL.to_string(),
            daily_ttl: DAILY_TTL,
            sentiment_ttl: SENTIMENT_TTL,
            intraday_ttl: INTRADAY_TTL,
            in_flight: DashMap::new(),
        }
    }

    pub fn with_default_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.default_symbol = symbol.into();
        self
    }

    pub fn with_ttls(mut self, daily: Duration, sentiment: Duration, intraday: Duration) -> Self {
        self.daily_ttl = daily;
        self.sentiment_ttl = sentiment;
        self.intraday_ttl = intraday;
        self
    }

    /// Blank or missing symbols fall back to the service default; anything
    /// else is trimmed and uppercased.
    pub fn resolve_symbol(&self, symbol: Option<&str>) -> String {
        match symbol.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_uppercase(),
            _ => self.default_symbol.clone(),
        }
    }

    /// Cache-fronted daily history. The credential is resolved only when a
    /// refresh is actually needed, so a warm cache works without a key.
    pub async fn get_daily_series(
        &self,
        symbol: &str,
        force: bool,
    ) -> Result<DailySeries, MarketError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(MarketError::InvalidInput("symbol is required".to_string()));
        }

        let upstream_symbol = symbol.to_uppercase();
        let market_data = Arc::clone(&self.market_data);
        let credentials = Arc::clone(&self.credentials);

        self.fetch_with_cache(CacheKind::Daily, symbol, self.daily_ttl, force, move || {
            async move {
                let api_key = credentials.api_key().ok_or(MarketError::MissingCredential)?;
                market_data.fetch_daily(&upstream_symbol, &api_key).await
            }
        })
        .await
    }

    /// Cache-fronted intraday history. Latest bars are keyed per
    /// (symbol, interval); a historical month gets its own entry keyed
    /// per (symbol, interval, month).
    pub async fn get_intraday(
        &self,
        symbol: &str,
        interval: &str,
        month: Option<&str>,
        force: bool,
    ) -> Result<IntradaySeries, MarketError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(MarketError::InvalidInput("symbol is required".to_string()));
        }
        if !INTRADAY_INTERVALS.contains(&interval) {
            return Err(MarketError::InvalidInput(format!(
                "unsupported interval {:?} (expected one of {})",
                interval,
                INTRADAY_INTERVALS.join(", ")
            )));
        }
        if let Some(month) = month {
            validate_month(month)?;
        }

        let upstream_symbol = symbol.to_uppercase();
        let interval_owned = interval.to_string();
        let month_owned = month.map(str::to_string);
        let market_data = Arc::clone(&self.market_data);
        let credentials = Arc::clone(&self.credentials);
        let key = match month {
            Some(month) => format!("{}-{}-{}", symbol, interval, month),
            None => format!("{}-{}", symbol, interval),
        };

        self.fetch_with_cache(CacheKind::Intraday, &key, self.intraday_ttl, force, move || {
            async move {
                let api_key = credentials.api_key().ok_or(MarketError::MissingCredential)?;
                market_data
                    .fetch_intraday(
                        &upstream_symbol,
                        &interval_owned,
                        month_owned.as_deref(),
                        &api_key,
                    )
                    .await
            }
        })
        .await
    }

    /// Forecast for the resolved symbol. Retrieving the daily series first
    /// warms the cache and surfaces credential or provider problems before
    /// the model call; its provenance string labels the response.
    pub async fn predict(
        &self,
        symbol: Option<&str>,
        horizon: u32,
        force: bool,
    ) -> Result<PredictionOutcome, MarketError> {
        let symbol = self.resolve_symbol(symbol);
        let series = self.get_daily_series(&symbol, force).await?;
        let prediction = self.forecast.predict(&symbol, horizon).await?;

        Ok(PredictionOutcome {
            symbol,
            horizon,
            prediction,
            source: series.source,
        })
    }

    /// Cache-fronted sentiment payload. Hits return the stored JSON
    /// verbatim; refreshes run the sentiment pipeline and persist a record
    /// keyed to the request symbol.
    pub async fn get_sentiment(
        &self,
        symbol: Option<&str>,
        force: bool,
    ) -> Result<serde_json::Value, MarketError> {
        let symbol = self.resolve_symbol(symbol);
        let sentiment = Arc::clone(&self.sentiment);
        let subject = symbol.clone();

        self.fetch_with_cache(
            CacheKind::Sentiment,
            &symbol,
            self.sentiment_ttl,
            force,
            move || async move {
                let result = sentiment
                    .analyze(&subject)
                    .await?
                    .ok_or(MarketError::NullSentiment)?;
                let record = SentimentRecord::from_result(&subject, &result, SENTIMENT_SOURCE);
                serde_json::to_value(&record).map_err(|e| MarketError::Cache(e.to_string()))
            },
        )
        .await
    }

    /// Sentiment-adjusted forecast. Stages run in order and every failure
    /// is reported for the stage that produced it: market data first, then
    /// forecast, then sentiment.
    pub async fn combined_prediction(
        &self,
        symbol: Option<&str>,
        horizon: u32,
        force: bool,
    ) -> Result<CombinedPrediction, MarketError> {
        let symbol = self.resolve_symbol(symbol);
        self.get_daily_series(&symbol, force).await?;

        let original = self.forecast.predict(&symbol, horizon).await?;
        if original.is_empty() {
            return Err(MarketError::EmptyForecast);
        }

        let sentiment = self
            .sentiment
            .analyze(&symbol)
            .await?
            .ok_or(MarketError::NullSentiment)?;

        let adjusted = adjustment_engine::adjust_predictions(&original, Some(&sentiment));
        tracing::info!(
            %symbol,
            score = sentiment.score,
            days = original.len(),
            "combined prediction assembled"
        );

        Ok(CombinedPrediction {
            symbol,
            sentiment: SentimentSummary {
                score: sentiment.score,
                label: sentiment.label,
            },
            original_predictions: original,
            adjusted_predictions: adjusted,
        })
    }

    /// Freshness check, cached read, and refresh-on-miss for one artifact.
    /// A fresh file that fails to deserialize counts as a miss. Concurrent
    /// misses for the same path serialize on a per-path guard and re-check
    /// freshness after acquiring it, so a cold key hits the upstream once.
    async fn fetch_with_cache<T, F, Fut>(
        &self,
        kind: CacheKind,
        key: &str,
        ttl: Duration,
        force: bool,
        fetch: F,
    ) -> Result<T, MarketError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, MarketError>>,
    {
        let path = self.store.path(kind, key);

        if !force {
            if let Some(value) = self.read_fresh(&path, ttl) {
                tracing::debug!(path = %path.display(), "cache hit");
                return Ok(value);
            }
        }

        let guard_key = path.display().to_string();
        let guard = Arc::clone(self.in_flight.entry(guard_key.clone()).or_default().value());

        let result: Result<T, MarketError> = async {
            let _locked = guard.lock().await;

            if !force {
                if let Some(value) = self.read_fresh(&path, ttl) {
                    tracing::debug!(path = %path.display(), "cache hit after waiting on refresh");
                    return Ok(value);
                }
            }

            let value = fetch().await?;
            self.store.write(&path, &value)?;
            tracing::info!(path = %path.display(), "cache refreshed");
            Ok(value)
        }
        .await;

        // The last holder retires the guard so the map does not grow with
        // every distinct key seen.
        drop(guard);
        self.in_flight
            .remove_if(&guard_key, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    fn read_fresh<T: DeserializeOwned>(&self, path: &Path, ttl: Duration) -> Option<T> {
        if !is_fresh(path, ttl) {
            return None;
        }
        match self.store.read(path) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable cache treated as miss");
                None
            }
        }
    }
}

/// Historical intraday months are `YYYY-MM`, the shape Alpha Vantage
/// accepts for its `month` parameter.
fn validate_month(month: &str) -> Result<(), MarketError> {
    let bytes = month.as_bytes();
    let well_formed = bytes.len() == 7
        && bytes[4] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || b.is_ascii_digit());

    if well_formed {
        Ok(())
    } else {
        Err(MarketError::InvalidInput(format!(
            "invalid month {:?} (expected YYYY-MM)",
            month
        )))
    }
}
