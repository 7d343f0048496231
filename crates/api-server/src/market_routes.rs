//! Market Data Routes
//!
//! Endpoints for cached price history, model forecasts, news sentiment,
//! and the sentiment-adjusted combined forecast.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use market_core::{CombinedPrediction, DailySeries, IntradaySeries, PredictionOutcome};
use serde::Deserialize;

use crate::{AppError, AppState};

/// Query parameters shared by the history and sentiment endpoints.
#[derive(Debug, Deserialize)]
pub struct SymbolQuery {
    pub symbol: Option<String>,
    /// Refresh the cache even when it is still fresh.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct IntradayQuery {
    pub symbol: Option<String>,
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Historical `YYYY-MM` window; omitted means the latest bars.
    pub month: Option<String>,
    #[serde(default)]
    pub force: bool,
}

fn default_interval() -> String {
    "5min".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub symbol: Option<String>,
    /// Trading days to forecast.
    #[serde(default = "default_horizon")]
    pub horizon: u32,
    #[serde(default)]
    pub force: bool,
}

fn default_horizon() -> u32 {
    market_orchestrator::DEFAULT_HORIZON
}

pub fn market_routes() -> Router<AppState> {
    Router::new()
        .route("/market/daily", get(get_daily))
        .route("/market/intraday", get(get_intraday))
        .route("/market/predict", get(get_predict))
        .route("/market/sentiment", get(get_sentiment))
        .route("/market/combined-prediction", get(get_combined_prediction))
}

/// Daily OHLCV history, served from the file cache while it is fresh.
async fn get_daily(
    State(state): State<AppState>,
    Query(query): Query<SymbolQuery>,
) -> Result<Json<DailySeries>, AppError> {
    let symbol = state.orchestrator.resolve_symbol(query.symbol.as_deref());
    let series = state
        .orchestrator
        .get_daily_series(&symbol, query.force)
        .await?;
    Ok(Json(series))
}

/// Intraday bars for one of the supported intervals, either the latest
/// window or a specific historical month.
async fn get_intraday(
    State(state): State<AppState>,
    Query(query): Query<IntradayQuery>,
) -> Result<Json<IntradaySeries>, AppError> {
    let symbol = state.orchestrator.resolve_symbol(query.symbol.as_deref());
    let series = state
        .orchestrator
        .get_intraday(&symbol, &query.interval, query.month.as_deref(), query.force)
        .await?;
    Ok(Json(series))
}

/// Model forecast for the next `horizon` trading days.
async fn get_predict(
    State(state): State<AppState>,
    Query(query): Query<PredictQuery>,
) -> Result<Json<PredictionOutcome>, AppError> {
    let outcome = state
        .orchestrator
        .predict(query.symbol.as_deref(), query.horizon, query.force)
        .await?;
    Ok(Json(outcome))
}

/// Cached news sentiment for the symbol.
async fn get_sentiment(
    State(state): State<AppState>,
    Query(query): Query<SymbolQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let record = state
        .orchestrator
        .get_sentiment(query.symbol.as_deref(), query.force)
        .await?;
    Ok(Json(record))
}

/// Forecast with each predicted price adjusted by current news sentiment.
async fn get_combined_prediction(
    State(state): State<AppState>,
    Query(query): Query<PredictQuery>,
) -> Result<Json<CombinedPrediction>, AppError> {
    let combined = state
        .orchestrator
        .combined_prediction(query.symbol.as_deref(), query.horizon, query.force)
        .await?;
    Ok(Json(combined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn symbol_query_defaults() {
        let query: SymbolQuery = serde_json::from_value(json!({})).unwrap();
        assert!(query.symbol.is_none());
        assert!(!query.force);
    }

    #[test]
    fn intraday_query_defaults_to_five_minutes() {
        let query: IntradayQuery = serde_json::from_value(json!({ "symbol": "IBM" })).unwrap();
        assert_eq!(query.interval, "5min");
        assert!(query.month.is_none());
        assert!(!query.force);
    }

    #[test]
    fn intraday_query_accepts_a_month() {
        let query: IntradayQuery =
            serde_json::from_value(json!({ "interval": "15min", "month": "2009-01" })).unwrap();
        assert_eq!(query.interval, "15min");
        assert_eq!(query.month.as_deref(), Some("2009-01"));
    }

    #[test]
    fn predict_query_defaults_to_ten_days() {
        let query: PredictQuery = serde_json::from_value(json!({})).unwrap();
        assert!(query.symbol.is_none());
        assert_eq!(query.horizon, 10);
    }

    #[test]
    fn explicit_parameters_override_defaults() {
        let query: PredictQuery =
            serde_json::from_value(json!({ "symbol": "msft", "horizon": 3, "force": true }))
                .unwrap();
        assert_eq!(query.symbol.as_deref(), Some("msft"));
        assert_eq!(query.horizon, 3);
        assert!(query.force);
    }
}
