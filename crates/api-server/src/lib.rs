//! MarketPulse API Server
//!
//! HTTP surface over the market orchestrator: cached daily and intraday
//! history, model forecasts, news sentiment, and the sentiment-adjusted
//! combined forecast.

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use alphavantage_client::AlphaVantageClient;
use json_cache::JsonStore;
use market_core::{CredentialProvider, MarketError};
use market_orchestrator::MarketOrchestrator;
use model_client::{ForecastClient, ModelConfig, SentimentModelClient};
use news_sentiment::{CompanyLookupClient, NewsSearchClient, SentimentService};

mod market_routes;

pub use market_routes::market_routes;

/// Combined requests chain market data, forecast, and sentiment upstreams
/// on a cold cache, so the stack-wide deadline stays generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Server configuration resolved from the environment, with workable
/// defaults for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub data_dir: String,
    pub default_symbol: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            default_symbol: std::env::var("DEFAULT_SYMBOL")
                .unwrap_or_else(|_| market_orchestrator::DEFAULT_SYMBOL.to_string()),
        }
    }
}

/// Alpha Vantage credential captured once at startup. Handlers never read
/// the environment, and a warm cache serves without any key at all.
pub struct EnvCredentialProvider {
    key: Option<String>,
}

impl EnvCredentialProvider {
    pub fn from_env() -> Self {
        Self {
            key: resolve_api_key(
                std::env::var("ALPHAVANTAGE_API_KEY").ok(),
                std::env::var("API_KEY_FALLBACK").ok(),
            ),
        }
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn api_key(&self) -> Option<String> {
        self.key.clone()
    }
}

/// Primary key wins; blank values count as absent.
fn resolve_api_key(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<MarketOrchestrator>,
    pub forecast_model: ForecastClient,
    pub sentiment_model: SentimentModelClient,
}

/// Route-level error wrapper. Bad input maps to 400; everything else is an
/// upstream or cache failure surfaced as 502.
pub struct AppError(MarketError);

impl From<MarketError> for AppError {
    fn from(err: MarketError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        };

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Wire the orchestrator and its collaborators from the environment.
pub fn build_state(config: &ServerConfig) -> AppState {
    let models = ModelConfig::default();
    let forecast_model = ForecastClient::new(models.forecast_url.clone(), models.timeout);
    let sentiment_model = SentimentModelClient::new(models.sentiment_url.clone(), models.timeout);

    let mut sentiment = SentimentService::new(sentiment_model.clone());
    match std::env::var("COMPANY_LOOKUP_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            sentiment = sentiment.with_company_lookup(CompanyLookupClient::new(key));
        }
        _ => tracing::warn!("COMPANY_LOOKUP_API_KEY not set; sentiment queries use the raw symbol"),
    }
    match std::env::var("NEWS_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            sentiment = sentiment.with_news_search(NewsSearchClient::new(key));
        }
        _ => tracing::warn!("NEWS_API_KEY not set; sentiment runs on a synthetic prompt"),
    }

    let credentials = EnvCredentialProvider::from_env();
    if credentials.api_key().is_none() {
        tracing::warn!("no Alpha Vantage key configured; only cached market data will serve");
    }

    let orchestrator = MarketOrchestrator::new(
        JsonStore::new(&config.data_dir),
        Arc::new(AlphaVantageClient::new()),
        Arc::new(forecast_model.clone()),
        Arc::new(sentiment),
        Arc::new(credentials),
    )
    .with_default_symbol(&config.default_symbol);

    AppState {
        orchestrator: Arc::new(orchestrator),
        forecast_model,
        sentiment_model,
    }
}

/// Build the full route stack over the given state.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(market_routes())
        .route("/health", get(health))
        .route("/health/models", get(models_health))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Reachability of the two model services. `false` covers transport errors
/// as well as non-success statuses.
async fn models_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (forecast, sentiment) =
        tokio::join!(state.forecast_model.health(), state.sentiment_model.health());

    Json(json!({
        "forecast": forecast.unwrap_or(false),
        "sentiment": sentiment.unwrap_or(false),
    }))
}

async fn handle_middleware_error(err: BoxError) -> (StatusCode, Json<serde_json::Value>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "error": "request timed out" })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
    }
}

/// Bring up the server: load `.env`, initialize tracing, wire the
/// orchestrator, and serve until shutdown.
pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    let state = build_state(&config);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Market API listening on {}", config.bind_addr);
    axum::serve(listener, app_router(state)).await?;
    Ok(())
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "api_server=info,market_orchestrator=info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "api_server=info,market_orchestrator=info".into()),
            )
            .init();
    }
}
