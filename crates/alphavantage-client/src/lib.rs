use std::time::Duration;

use async_trait::async_trait;
use market_core::{Bar, DailySeries, IntradaySeries, MarketDataPort, MarketError};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

const BASE_URL: &str = "https://www.alphavantage.co/query";

const DAILY_SERIES_KEY: &str = "Time Series (Daily)";

/// Alpha Vantage market-data client. The API key is not stored here; the
/// orchestrator resolves it per refresh and passes it in, so a warm cache
/// never needs a credential.
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
}

impl AlphaVantageClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    /// Every parameter goes through the encoded query builder; values are
    /// never spliced into the URL by hand.
    fn request(&self, params: &[(&str, &str)], api_key: &str) -> reqwest::RequestBuilder {
        self.client
            .get(BASE_URL)
            .query(params)
            .query(&[("apikey", api_key)])
    }

    async fn get_json(&self, params: &[(&str, &str)], api_key: &str) -> Result<Value, MarketError> {
        tracing::debug!(?params, "alpha vantage request");

        let response = self
            .request(params, api_key)
            .send()
            .await
            .map_err(|e| MarketError::MarketData(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MarketError::MarketData(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| MarketError::MarketData(e.to_string()))?;

        check_provider_errors(&json)?;
        Ok(json)
    }
}

impl Default for AlphaVantageClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataPort for AlphaVantageClient {
    async fn fetch_daily(&self, symbol: &str, api_key: &str) -> Result<DailySeries, MarketError> {
        let params = [
            ("function", "TIME_SERIES_DAILY"),
            ("outputsize", "compact"),
            ("symbol", symbol),
        ];
        let json = self.get_json(&params, api_key).await?;

        let source = format!("alphavantage: TIME_SERIES_DAILY (compact), symbol={}", symbol);
        let bars = parse_series(&json, DAILY_SERIES_KEY)?;
        tracing::info!(%symbol, bars = bars.len(), "fetched daily series");

        Ok(DailySeries::new(symbol, source, bars))
    }

    async fn fetch_intraday(
        &self,
        symbol: &str,
        interval: &str,
        month: Option<&str>,
        api_key: &str,
    ) -> Result<IntradaySeries, MarketError> {
        let params = intraday_params(symbol, interval, month);
        let json = self.get_json(&params, api_key).await?;

        let source = match month {
            Some(month) => format!(
                "alphavantage: TIME_SERIES_INTRADAY (month={}, full), symbol={}, interval={}",
                month, symbol, interval
            ),
            None => format!(
                "alphavantage: TIME_SERIES_INTRADAY (latest), symbol={}, interval={}",
                symbol, interval
            ),
        };
        let series_key = format!("Time Series ({})", interval);
        let bars = parse_series(&json, &series_key)?;
        tracing::info!(%symbol, %interval, ?month, bars = bars.len(), "fetched intraday series");

        Ok(IntradaySeries::new(symbol, interval, source, bars))
    }
}

/// A historical month needs the full output; the latest window keeps the
/// compact default.
fn intraday_params<'a>(
    symbol: &'a str,
    interval: &'a str,
    month: Option<&'a str>,
) -> Vec<(&'a str, &'a str)> {
    let mut params = vec![
        ("function", "TIME_SERIES_INTRADAY"),
        ("symbol", symbol),
        ("interval", interval),
    ];
    match month {
        Some(month) => {
            params.push(("month", month));
            params.push(("outputsize", "full"));
        }
        None => params.push(("outputsize", "compact")),
    }
    params
}

/// Alpha Vantage reports problems as 200 responses with one of three
/// well-known top-level fields.
fn check_provider_errors(json: &Value) -> Result<(), MarketError> {
    if let Some(error) = json.get("Error Message") {
        return Err(MarketError::MarketData(format!(
            "Alpha Vantage error: {}",
            error
        )));
    }
    if let Some(note) = json.get("Note") {
        return Err(MarketError::MarketData(format!(
            "Alpha Vantage rate limit: {}",
            note
        )));
    }
    if let Some(info) = json.get("Information") {
        return Err(MarketError::MarketData(format!(
            "Alpha Vantage notice: {}",
            info
        )));
    }
    Ok(())
}

fn parse_series(json: &Value, series_key: &str) -> Result<Vec<Bar>, MarketError> {
    let series = json
        .get(series_key)
        .and_then(|v| v.as_object())
        .ok_or_else(|| {
            MarketError::MarketData(format!("response has no {:?} object", series_key))
        })?;

    let mut bars = Vec::with_capacity(series.len());
    for (timestamp, values) in series {
        bars.push(parse_bar(timestamp, values)?);
    }
    Ok(bars)
}

/// Every price/volume field must be present; a bar with a hole is a
/// data-integrity failure, not a default.
fn parse_bar(timestamp: &str, values: &Value) -> Result<Bar, MarketError> {
    Ok(Bar {
        timestamp: timestamp.to_string(),
        open: decimal_field(values, timestamp, "1. open")?,
        high: decimal_field(values, timestamp, "2. high")?,
        low: decimal_field(values, timestamp, "3. low")?,
        close: decimal_field(values, timestamp, "4. close")?,
        volume: volume_field(values, timestamp, "5. volume")?,
    })
}

fn raw_field<'a>(values: &'a Value, timestamp: &str, field: &str) -> Result<&'a str, MarketError> {
    values.get(field).and_then(|v| v.as_str()).ok_or_else(|| {
        MarketError::MarketData(format!("bar {} missing field {:?}", timestamp, field))
    })
}

fn decimal_field(values: &Value, timestamp: &str, field: &str) -> Result<Decimal, MarketError> {
    let raw = raw_field(values, timestamp, field)?;
    raw.parse().map_err(|_| {
        MarketError::MarketData(format!(
            "bar {} field {:?} is not a number: {}",
            timestamp, field, raw
        ))
    })
}

fn volume_field(values: &Value, timestamp: &str, field: &str) -> Result<u64, MarketError> {
    let raw = raw_field(values, timestamp, field)?;
    raw.parse().map_err(|_| {
        MarketError::MarketData(format!(
            "bar {} field {:?} is not a volume: {}",
            timestamp, field, raw
        ))
    })
}
