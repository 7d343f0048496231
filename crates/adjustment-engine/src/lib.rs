use chrono::NaiveDate;
use market_core::{PredictionMap, SentimentResult};

/// Maximum fractional price move a sentiment extreme can produce on the
/// nearest date (score 1 or 5, day offset 0 gives roughly +/-14.5%).
pub const BASE_SENTIMENT_STRENGTH: f64 = 0.15;

/// Per-day exponential decay rate of the sentiment effect.
pub const TIME_DECAY_RATE: f64 = 0.12;

const NEUTRAL_SCORE: i32 = 3;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Applies a sentiment tilt to a date-keyed price forecast.
///
/// The star score s in [1, 5] is normalized to n = (s - 3) / 2 in [-1, 1]
/// and mapped to a bounded base adjustment `BASE_SENTIMENT_STRENGTH *
/// tanh(2n)`, then scaled per entry by `exp(-TIME_DECAY_RATE * day_offset)`
/// where day_offset counts days from today to the predicted date (past
/// dates clamp to 0). Adjusted prices are rendered with two fraction
/// digits. An entry whose date or price does not parse is copied through
/// unchanged; a malformed entry never fails the whole map.
pub fn adjust_predictions(
    predictions: &PredictionMap,
    sentiment: Option<&SentimentResult>,
) -> PredictionMap {
    adjust_predictions_on(predictions, sentiment, today())
}

/// Same as [`adjust_predictions`] with an explicit reference date.
pub fn adjust_predictions_on(
    predictions: &PredictionMap,
    sentiment: Option<&SentimentResult>,
    today: NaiveDate,
) -> PredictionMap {
    if predictions.is_empty() {
        return PredictionMap::new();
    }
    let Some(sentiment) = sentiment else {
        return predictions.clone();
    };

    let normalized = (sentiment.score.clamp(1, 5) - NEUTRAL_SCORE) as f64 / 2.0;
    let base = BASE_SENTIMENT_STRENGTH * (2.0 * normalized).tanh();

    let mut adjusted = PredictionMap::new();
    for (date, price) in predictions {
        adjusted.insert(date.clone(), adjust_entry(date, price, base, today));
    }
    adjusted
}

fn adjust_entry(date: &str, price: &str, base: f64, today: NaiveDate) -> String {
    let Ok(parsed_date) = NaiveDate::parse_from_str(date, DATE_FORMAT) else {
        return price.to_string();
    };
    let Ok(parsed_price) = price.trim().parse::<f64>() else {
        return price.to_string();
    };

    let day_offset = (parsed_date - today).num_days().max(0);
    let decay = (-TIME_DECAY_RATE * day_offset as f64).exp();
    format!("{:.2}", parsed_price * (1.0 + base * decay))
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TODAY: &str = "2024-01-10";

    fn fixed_today() -> NaiveDate {
        NaiveDate::parse_from_str(TODAY, DATE_FORMAT).unwrap()
    }

    fn predictions(entries: &[(&str, &str)]) -> PredictionMap {
        entries
            .iter()
            .map(|(d, p)| (d.to_string(), p.to_string()))
            .collect()
    }

    fn price(map: &PredictionMap, date: &str) -> f64 {
        map[date].parse().unwrap()
    }

    #[test]
    fn empty_predictions_stay_empty() {
        let out = adjust_predictions_on(
            &PredictionMap::new(),
            Some(&SentimentResult::new("x", 5)),
            fixed_today(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn missing_sentiment_copies_the_input() {
        let input = predictions(&[("2024-01-11", "100.00"), ("2024-01-12", "101.50")]);
        let out = adjust_predictions_on(&input, None, fixed_today());
        assert_eq!(out, input);
    }

    #[test]
    fn neutral_sentiment_leaves_prices_unchanged() {
        let input = predictions(&[("2024-01-11", "100.00"), ("2024-01-20", "250.25")]);
        let out = adjust_predictions_on(
            &input,
            Some(&SentimentResult::new("x", 3)),
            fixed_today(),
        );
        assert_eq!(out, input);
    }

    #[test]
    fn positive_sentiment_raises_every_future_price() {
        let input = predictions(&[("2024-01-11", "100.00"), ("2024-01-15", "200.00")]);
        let out = adjust_predictions_on(
            &input,
            Some(&SentimentResult::new("x", 5)),
            fixed_today(),
        );

        assert!(price(&out, "2024-01-11") > 100.0);
        assert!(price(&out, "2024-01-15") > 200.0);
    }

    #[test]
    fn negative_sentiment_lowers_every_future_price() {
        let input = predictions(&[("2024-01-11", "100.00"), ("2024-01-15", "200.00")]);
        let out = adjust_predictions_on(
            &input,
            Some(&SentimentResult::new("x", 1)),
            fixed_today(),
        );

        assert!(price(&out, "2024-01-11") < 100.0);
        assert!(price(&out, "2024-01-15") < 200.0);
    }

    #[test]
    fn effect_decays_with_forecast_distance() {
        let input = predictions(&[("2024-01-11", "100.00"), ("2024-01-25", "100.00")]);
        let out = adjust_predictions_on(
            &input,
            Some(&SentimentResult::new("x", 5)),
            fixed_today(),
        );

        let near_lift = price(&out, "2024-01-11") - 100.0;
        let far_lift = price(&out, "2024-01-25") - 100.0;
        assert!(near_lift > far_lift);
        assert!(far_lift > 0.0);
    }

    #[test]
    fn known_values_for_score_four() {
        // normalized 0.5, base = 0.15 * tanh(1.0); offsets 0 and 1 day.
        let input = predictions(&[("2024-01-10", "100.00"), ("2024-01-11", "100.00")]);
        let out = adjust_predictions_on(
            &input,
            Some(&SentimentResult::new("x", 4)),
            fixed_today(),
        );

        assert_eq!(out["2024-01-10"], "111.42");
        assert_eq!(out["2024-01-11"], "110.13");
    }

    #[test]
    fn past_dates_clamp_to_full_strength() {
        let input = predictions(&[("2023-12-01", "100.00"), ("2024-01-10", "100.00")]);
        let out = adjust_predictions_on(
            &input,
            Some(&SentimentResult::new("x", 5)),
            fixed_today(),
        );

        assert_eq!(out["2023-12-01"], out["2024-01-10"]);
    }

    #[test]
    fn malformed_date_passes_through_while_siblings_adjust() {
        let input = predictions(&[("not-a-date", "100.00"), ("2024-01-11", "100.00")]);
        let out = adjust_predictions_on(
            &input,
            Some(&SentimentResult::new("x", 5)),
            fixed_today(),
        );

        assert_eq!(out["not-a-date"], "100.00");
        assert!(price(&out, "2024-01-11") > 100.0);
    }

    #[test]
    fn malformed_price_passes_through_while_siblings_adjust() {
        let input = predictions(&[("2024-01-11", "n/a"), ("2024-01-12", "100.00")]);
        let out = adjust_predictions_on(
            &input,
            Some(&SentimentResult::new("x", 5)),
            fixed_today(),
        );

        assert_eq!(out["2024-01-11"], "n/a");
        assert!(price(&out, "2024-01-12") > 100.0);
    }

    #[test]
    fn far_future_effect_vanishes_at_two_decimals() {
        let input = predictions(&[("2025-01-10", "100.00")]);
        let out = adjust_predictions_on(
            &input,
            Some(&SentimentResult::new("x", 5)),
            fixed_today(),
        );

        assert_eq!(out["2025-01-10"], "100.00");
    }

    #[test]
    fn out_of_range_scores_behave_like_the_clamped_extreme() {
        // hand-built result bypassing the constructor clamp
        let wild = SentimentResult {
            subject: "x".into(),
            score: 9,
            label: "very positive".into(),
        };
        let input = predictions(&[("2024-01-11", "100.00")]);

        let from_wild = adjust_predictions_on(&input, Some(&wild), fixed_today());
        let from_five = adjust_predictions_on(
            &input,
            Some(&SentimentResult::new("x", 5)),
            fixed_today(),
        );

        assert_eq!(from_wild, from_five);
    }
}
