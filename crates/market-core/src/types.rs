use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Forecast output: `YYYY-MM-DD` date to a price rendered with two
/// fraction digits. BTreeMap keeps the dates in chronological order.
pub type PredictionMap = BTreeMap<String, String>;

/// OHLCV bar. Daily bars carry a `YYYY-MM-DD` timestamp, intraday bars
/// the provider's date-time string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

/// Daily price history for one symbol, oldest bar first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySeries {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    pub source: String,
    pub bars: Vec<Bar>,
}

impl DailySeries {
    /// Uppercases the symbol, stamps `as_of`, and normalizes the bars to
    /// ascending order with unique timestamps.
    pub fn new(symbol: &str, source: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            as_of: Utc::now(),
            source: source.into(),
            bars: normalize_bars(bars),
        }
    }

    pub fn latest_close(&self) -> Option<Decimal> {
        self.bars.last().map(|b| b.close)
    }
}

/// Intraday price history for one symbol at a fixed interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntradaySeries {
    pub symbol: String,
    pub interval: String,
    pub as_of: DateTime<Utc>,
    pub source: String,
    pub bars: Vec<Bar>,
}

impl IntradaySeries {
    pub fn new(
        symbol: &str,
        interval: impl Into<String>,
        source: impl Into<String>,
        bars: Vec<Bar>,
    ) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            interval: interval.into(),
            as_of: Utc::now(),
            source: source.into(),
            bars: normalize_bars(bars),
        }
    }
}

fn normalize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    bars.dedup_by(|next, kept| next.timestamp == kept.timestamp);
    bars
}

/// News-sentiment classification outcome on the five-star scale:
/// 1 = very negative, 5 = very positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub subject: String,
    pub score: i32,
    pub label: String,
}

impl SentimentResult {
    /// Clamps the score into `[1, 5]` and derives the matching label.
    pub fn new(subject: impl Into<String>, score: i32) -> Self {
        let score = score.clamp(1, 5);
        Self {
            subject: subject.into(),
            score,
            label: label_for_score(score).to_string(),
        }
    }
}

/// Label scale used by the star-rating sentiment classifier.
pub fn label_for_score(score: i32) -> &'static str {
    match score.clamp(1, 5) {
        1 => "very negative",
        2 => "negative",
        3 => "neutral",
        4 => "positive",
        _ => "very positive",
    }
}

/// Sentiment payload as persisted in the cache and served to clients.
/// Both `company` and `symbol` are set from the request symbol, never
/// from whatever subject the classifier echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub company: String,
    pub symbol: String,
    pub sentiment_score: i32,
    pub sentiment_label: String,
    pub source: String,
}

impl SentimentRecord {
    pub fn from_result(symbol: &str, result: &SentimentResult, source: impl Into<String>) -> Self {
        Self {
            company: symbol.to_string(),
            symbol: symbol.to_string(),
            sentiment_score: result.score,
            sentiment_label: result.label.clone(),
            source: source.into(),
        }
    }
}

/// Response body for the forecast endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub symbol: String,
    pub horizon: u32,
    pub prediction: PredictionMap,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub score: i32,
    pub label: String,
}

/// Response body for the sentiment-adjusted forecast endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedPrediction {
    pub symbol: String,
    pub sentiment: SentimentSummary,
    pub original_predictions: PredictionMap,
    pub adjusted_predictions: PredictionMap,
}
