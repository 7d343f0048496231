use std::time::Duration;

use async_trait::async_trait;
use market_core::{MarketError, SentimentPort, SentimentResult};
use model_client::SentimentModelClient;
use serde::Deserialize;

const LOOKUP_BASE_URL: &str = "https://financialmodelingprep.com/api/v3/search";
const NEWS_BASE_URL: &str = "https://newsapi.org/v2/everything";

const MAX_HEADLINES: usize = 10;
const AUX_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct LookupMatch {
    #[serde(default)]
    name: Option<String>,
}

/// Resolves a ticker to the company's display name.
#[derive(Clone)]
pub struct CompanyLookupClient {
    client: reqwest::Client,
    api_key: String,
}

impl CompanyLookupClient {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(AUX_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, api_key }
    }

    pub async fn company_name(&self, symbol: &str) -> Result<Option<String>, MarketError> {
        let response = self
            .client
            .get(LOOKUP_BASE_URL)
            .query(&[("query", symbol), ("limit", "1"), ("apikey", &self.api_key)])
            .send()
            .await
            .map_err(|e| MarketError::Sentiment(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MarketError::Sentiment(format!(
                "company lookup HTTP {}",
                response.status()
            )));
        }

        let matches: Vec<LookupMatch> = response
            .json()
            .await
            .map_err(|e| MarketError::Sentiment(e.to_string()))?;

        Ok(matches.into_iter().next().and_then(|m| m.name))
    }
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

/// Searches recent news headlines for a query string.
#[derive(Clone)]
pub struct NewsSearchClient {
    client: reqwest::Client,
    api_key: String,
}

impl NewsSearchClient {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(AUX_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, api_key }
    }

    pub async fn top_headlines(&self, query: &str, limit: usize) -> Result<Vec<String>, MarketError> {
        let limit_str = limit.to_string();
        let response = self
            .client
            .get(NEWS_BASE_URL)
            .query(&[
                ("q", query),
                ("language", "en"),
                ("sortBy", "popularity"),
                ("pageSize", &limit_str),
                ("apiKey", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| MarketError::Sentiment(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MarketError::Sentiment(format!(
                "news search HTTP {}",
                response.status()
            )));
        }

        let body: NewsResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Sentiment(e.to_string()))?;

        Ok(extract_headlines(body, limit))
    }
}

fn extract_headlines(body: NewsResponse, limit: usize) -> Vec<String> {
    body.articles
        .into_iter()
        .filter_map(|a| a.title)
        .filter(|t| !t.trim().is_empty())
        .take(limit)
        .collect()
}

fn fallback_prompt(query: &str) -> String {
    format!(
        "Recent financial news about {} stock performance and market outlook.",
        query
    )
}

/// News-sentiment pipeline: company lookup, headline search, then star
/// classification. The two auxiliary providers are optional; without them
/// the symbol itself is the query and a synthetic prompt stands in for
/// headlines.
pub struct SentimentService {
    lookup: Option<CompanyLookupClient>,
    news: Option<NewsSearchClient>,
    model: SentimentModelClient,
}

impl SentimentService {
    pub fn new(model: SentimentModelClient) -> Self {
        Self {
            lookup: None,
            news: None,
            model,
        }
    }

    pub fn with_company_lookup(mut self, client: CompanyLookupClient) -> Self {
        self.lookup = Some(client);
        self
    }

    pub fn with_news_search(mut self, client: NewsSearchClient) -> Self {
        self.news = Some(client);
        self
    }

    async fn resolve_company(&self, symbol: &str) -> Option<String> {
        let lookup = self.lookup.as_ref()?;
        match lookup.company_name(symbol).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "company lookup failed, using symbol as query");
                None
            }
        }
    }

    async fn gather_headlines(&self, query: &str) -> Vec<String> {
        let Some(news) = self.news.as_ref() else {
            return Vec::new();
        };
        match news.top_headlines(query, MAX_HEADLINES).await {
            Ok(headlines) => headlines,
            Err(e) => {
                tracing::warn!(%query, error = %e, "news search failed, proceeding without headlines");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SentimentPort for SentimentService {
    async fn analyze(&self, symbol: &str) -> Result<Option<SentimentResult>, MarketError> {
        let company = self.resolve_company(symbol).await;
        let query = company.unwrap_or_else(|| symbol.to_string());

        let mut texts = self.gather_headlines(&query).await;
        if texts.is_empty() {
            texts.push(fallback_prompt(&query));
        }
        tracing::debug!(%symbol, %query, texts = texts.len(), "classifying sentiment");

        let scored = self
            .model
            .classify(&query, &texts)
            .await
            .map_err(|e| MarketError::Sentiment(e.to_string()))?;

        Ok(scored.map(|s| SentimentResult::new(query, s.score)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_response_yields_first_company_name() {
        let matches: Vec<LookupMatch> = serde_json::from_str(
            r#"[{"symbol": "AMZN", "name": "Amazon.com Inc"}, {"name": "Amazon Fake Corp"}]"#,
        )
        .unwrap();

        let name = matches.into_iter().next().and_then(|m| m.name);
        assert_eq!(name.as_deref(), Some("Amazon.com Inc"));
    }

    #[test]
    fn lookup_response_tolerates_missing_name() {
        let matches: Vec<LookupMatch> = serde_json::from_str(r#"[{"symbol": "AMZN"}]"#).unwrap();
        assert!(matches.into_iter().next().and_then(|m| m.name).is_none());
    }

    #[test]
    fn headlines_skip_blank_titles_and_respect_limit() {
        let body: NewsResponse = serde_json::from_str(
            r#"{"articles": [
                {"title": "Amazon beats earnings"},
                {"title": "  "},
                {"title": null},
                {"title": "AWS growth accelerates"},
                {"title": "Retail margins improve"}
            ]}"#,
        )
        .unwrap();

        let headlines = extract_headlines(body, 2);
        assert_eq!(
            headlines,
            vec!["Amazon beats earnings", "AWS growth accelerates"]
        );
    }

    #[test]
    fn fallback_prompt_names_the_query() {
        let prompt = fallback_prompt("Amazon.com Inc");
        assert!(prompt.contains("Amazon.com Inc"));
    }
}
