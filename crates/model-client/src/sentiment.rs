use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, Serialize)]
struct ClassifyRequest {
    subject: String,
    texts: Vec<String>,
}

/// One classification on the five-star scale, as returned by the model
/// service (1 = very negative, 5 = very positive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarScore {
    pub score: i32,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    predictions: Vec<StarScore>,
}

/// Client for the star-rating sentiment classifier service.
#[derive(Clone)]
pub struct SentimentModelClient {
    client: reqwest::Client,
    base_url: String,
}

impl SentimentModelClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    /// Classify the given texts as one aggregate star rating. `None` means
    /// the service answered but produced no prediction.
    pub async fn classify(&self, subject: &str, texts: &[String]) -> ModelResult<Option<StarScore>> {
        let request = ClassifyRequest {
            subject: subject.to_string(),
            texts: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/analyze", self.base_url))
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
            .json::<ClassifyResponse>()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Ok(result.predictions.into_iter().next())
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
