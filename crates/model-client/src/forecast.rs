use std::time::Duration;

use async_trait::async_trait;
use market_core::{ForecastPort, MarketError, PredictionMap};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, Serialize)]
struct ForecastRequest {
    symbol: String,
    horizon: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    predictions: PredictionMap,
    #[serde(default)]
    model: Option<String>,
}

/// Client for the price-forecast model service.
#[derive(Clone)]
pub struct ForecastClient {
    client: reqwest::Client,
    base_url: String,
}

impl ForecastClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    /// Predict closing prices for the next `horizon` trading days.
    /// Returns a date-keyed map; an empty map is a valid response and the
    /// caller decides whether that is acceptable.
    pub async fn predict_prices(&self, symbol: &str, horizon: u32) -> ModelResult<PredictionMap> {
        let request = ForecastRequest {
            symbol: symbol.to_string(),
            horizon,
        };

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let result = response
            .json::<ForecastResponse>()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        if let Some(model) = &result.model {
            tracing::debug!(%symbol, %model, days = result.predictions.len(), "forecast received");
        }
        Ok(result.predictions)
    }

    /// Check service health
    pub async fn health(&self) -> ModelResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl ForecastPort for ForecastClient {
    async fn predict(&self, symbol: &str, horizon: u32) -> Result<PredictionMap, MarketError> {
        self.predict_prices(symbol, horizon)
            .await
            .map_err(|e| MarketError::Forecast(e.to_string()))
    }
}
