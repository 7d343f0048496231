pub mod error;
pub mod forecast;
pub mod sentiment;

pub use error::{ModelError, ModelResult};
pub use forecast::ForecastClient;
pub use sentiment::{SentimentModelClient, StarScore};

use std::time::Duration;

/// Configuration for the external model-serving processes.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub forecast_url: String,
    pub sentiment_url: String,
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            forecast_url: std::env::var("FORECAST_MODEL_URL")
                .unwrap_or_else(|_| "http://localhost:8501".to_string()),
            sentiment_url: std::env::var("SENTIMENT_MODEL_URL")
                .unwrap_or_else(|_| "http://localhost:8502".to_string()),
            timeout: Duration::from_secs(60),
        }
    }
}
