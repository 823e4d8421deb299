//! Per-product demand forecasting.
//!
//! [`generate_forecast`] runs the whole pipeline for one product:
//!
//! 1. prepare the raw records into a daily series
//! 2. classify trend and seasonality
//! 3. configure and fit the demand model (retrying once without covariates)
//! 4. estimate accuracy on a holdout split
//! 5. synthesize the horizon forecast into a [`ForecastResult`]
//!
//! Every call builds its own model; nothing is cached between products.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::accuracy::{estimate_accuracy, AccuracyEstimate};
use crate::error::{ForecastError, Result};
use crate::model::{fit_with_fallback, ModelConfig, ModelForecast};
use crate::patterns::{analyze_patterns, PatternClassification, Seasonality, Trend};
use crate::policy::ForecastPolicy;
use crate::series::{prepare_series, RawRecord};

pub const DEFAULT_FORECAST_DAYS: usize = 30;
pub const DEFAULT_CONFIDENCE_INTERVAL: f64 = 0.95;

fn default_forecast_days() -> usize {
    DEFAULT_FORECAST_DAYS
}

fn default_confidence_interval() -> f64 {
    DEFAULT_CONFIDENCE_INTERVAL
}

/// A forecast request for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub historical_data: Vec<RawRecord>,
    /// Number of future days to forecast
    #[serde(default = "default_forecast_days")]
    pub forecast_days: usize,
    /// Width of the model's uncertainty interval, strictly inside (0, 1)
    #[serde(default = "default_confidence_interval")]
    pub confidence_interval: f64,
    /// Product-level price used where a record carries none
    #[serde(default, alias = "unit_price")]
    pub fallback_price: Option<f64>,
}

impl ForecastRequest {
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        historical_data: Vec<RawRecord>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            historical_data,
            forecast_days: DEFAULT_FORECAST_DAYS,
            confidence_interval: DEFAULT_CONFIDENCE_INTERVAL,
            fallback_price: None,
        }
    }

    pub fn with_forecast_days(mut self, days: usize) -> Self {
        self.forecast_days = days;
        self
    }

    pub fn with_confidence_interval(mut self, width: f64) -> Self {
        self.confidence_interval = width;
        self
    }

    pub fn with_fallback_price(mut self, price: f64) -> Self {
        self.fallback_price = Some(price);
        self
    }

    /// Check the request parameters against the policy limits.
    pub fn validate(&self, policy: &ForecastPolicy) -> Result<()> {
        if self.forecast_days == 0 || self.forecast_days > policy.max_forecast_days {
            return Err(ForecastError::InvalidParameter {
                param: "forecast_days".to_string(),
                value: self.forecast_days.to_string(),
                reason: format!("must be between 1 and {}", policy.max_forecast_days),
            });
        }
        if !(self.confidence_interval > 0.0 && self.confidence_interval < 1.0) {
            return Err(ForecastError::InvalidParameter {
                param: "confidence_interval".to_string(),
                value: self.confidence_interval.to_string(),
                reason: "must be strictly between 0 and 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Forecast for one future day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    #[serde(rename = "predicted", alias = "predicted_demand")]
    pub predicted_demand: u64,
    /// Interval-derived confidence in [0.6, 1.0]
    pub confidence: f64,
}

/// Named confidence scores attached to a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceMetrics {
    pub overall_confidence: f64,
    pub trend_strength: f64,
    pub seasonality_strength: f64,
    pub data_quality: f64,
}

/// Result of a forecast run for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub product_id: String,
    pub product_name: String,
    pub forecast_data: Vec<ForecastPoint>,
    pub trend: Trend,
    pub seasonality: Seasonality,
    /// Accuracy percentage in [0, 100]
    pub accuracy: f64,
    /// False when `accuracy` is the unmeasured default
    pub accuracy_measured: bool,
    /// Day the forecast was produced
    pub forecast_date: NaiveDate,
    pub next_order_date: NaiveDate,
    pub recommended_quantity: u64,
    pub confidence_metrics: ConfidenceMetrics,
    /// Components of the fitted model
    pub model: String,
    /// True when the model had to be refitted without covariates
    #[serde(default)]
    pub covariates_stripped: bool,
}

/// Confidence of one point from its interval relative to the prediction.
///
/// Uses the raw model value; a non-positive prediction gets the default.
fn point_confidence(yhat: f64, lower: f64, upper: f64, policy: &ForecastPolicy) -> f64 {
    if yhat > 0.0 {
        ((upper - lower) / yhat).clamp(policy.min_point_confidence, policy.max_point_confidence)
    } else {
        policy.default_point_confidence
    }
}

/// Suggested next order date: half the horizon, capped at the reorder horizon.
pub fn next_order_date(today: NaiveDate, forecast_days: usize, policy: &ForecastPolicy) -> NaiveDate {
    let days = ((forecast_days / 2) as i64).min(policy.max_order_horizon_days);
    today + Duration::days(days)
}

/// Order quantity covering lead-time demand plus safety stock, at least 1.
pub fn recommended_quantity(points: &[ForecastPoint], policy: &ForecastPolicy) -> u64 {
    if points.is_empty() {
        return 1;
    }
    let avg = points.iter().map(|p| p.predicted_demand as f64).sum::<f64>() / points.len() as f64;
    let qty = (avg * policy.lead_time_days * policy.safety_factor).round();
    if qty < 1.0 {
        1
    } else {
        qty as u64
    }
}

/// Confidence scores for a forecast.
pub fn confidence_metrics(
    patterns: &PatternClassification,
    accuracy: f64,
    observations: usize,
    policy: &ForecastPolicy,
) -> ConfidenceMetrics {
    let trend_strength = if patterns.trend == Trend::Stable {
        policy.stable_strength
    } else {
        policy.trending_strength
    };

    ConfidenceMetrics {
        overall_confidence: accuracy / 100.0,
        trend_strength,
        seasonality_strength: policy.seasonality_strength.for_band(patterns.seasonality),
        data_quality: (observations as f64 / policy.data_quality_saturation).min(1.0),
    }
}

/// Combine model output, patterns and accuracy into a forecast result.
pub fn synthesize(
    request: &ForecastRequest,
    observations: usize,
    patterns: PatternClassification,
    accuracy: &AccuracyEstimate,
    forecast: &ModelForecast,
    today: NaiveDate,
    policy: &ForecastPolicy,
) -> ForecastResult {
    let forecast_data: Vec<ForecastPoint> = forecast
        .dates
        .iter()
        .enumerate()
        .map(|(i, &date)| {
            let yhat = forecast.point[i];
            ForecastPoint {
                date,
                predicted_demand: yhat.max(0.0).round() as u64,
                confidence: point_confidence(yhat, forecast.lower[i], forecast.upper[i], policy),
            }
        })
        .collect();

    let recommended_quantity = recommended_quantity(&forecast_data, policy);

    ForecastResult {
        product_id: request.product_id.clone(),
        product_name: request.product_name.clone(),
        trend: patterns.trend,
        seasonality: patterns.seasonality,
        accuracy: accuracy.accuracy,
        accuracy_measured: accuracy.measured,
        forecast_date: today,
        next_order_date: next_order_date(today, request.forecast_days, policy),
        recommended_quantity,
        confidence_metrics: confidence_metrics(&patterns, accuracy.accuracy, observations, policy),
        forecast_data,
        model: String::new(),
        covariates_stripped: false,
    }
}

/// Generate a demand forecast for one product.
///
/// # Arguments
/// * `request` - Product, history and horizon
/// * `today` - Run date used for the next-order date
/// * `policy` - Heuristic constants
///
/// # Errors
/// * Data validation errors for bad parameters, malformed records, or fewer
///   than `policy.min_observations` distinct dates
/// * `ModelFit` when the model cannot be fitted even without covariates
pub fn generate_forecast(
    request: &ForecastRequest,
    today: NaiveDate,
    policy: &ForecastPolicy,
) -> Result<ForecastResult> {
    request.validate(policy)?;

    let series = prepare_series(&request.historical_data, request.fallback_price)?;
    if series.len() < policy.min_observations {
        return Err(ForecastError::InsufficientData {
            needed: policy.min_observations,
            got: series.len(),
        });
    }

    let analysis = analyze_patterns(&series);
    let patterns = analysis.classification;
    tracing::debug!(
        product_id = %request.product_id,
        trend = patterns.trend.as_str(),
        seasonality = patterns.seasonality.as_str(),
        trend_signal = analysis.trend_signal,
        seasonality_ratio = ?analysis.seasonality_ratio,
        "detected demand pattern"
    );

    let config = ModelConfig::from_patterns(&patterns, request.confidence_interval, policy);
    let fit = fit_with_fallback(&series, &config)?;
    if fit.covariates_stripped {
        tracing::warn!(product_id = %request.product_id, "forecast fitted without covariates");
    }

    let accuracy = estimate_accuracy(&series, policy, request.confidence_interval);
    tracing::debug!(
        product_id = %request.product_id,
        accuracy = accuracy.accuracy,
        measured = accuracy.measured,
        mae = ?accuracy.mae,
        bias = ?accuracy.bias,
        holdout_points = accuracy.holdout_points,
        "holdout evaluation"
    );
    let horizon = fit.model.forecast(request.forecast_days)?;

    let mut result = synthesize(
        request,
        series.len(),
        patterns,
        &accuracy,
        &horizon,
        today,
        policy,
    );
    result.model = fit.model.description();
    result.covariates_stripped = fit.covariates_stripped;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn daily_records(values: &[f64]) -> Vec<RawRecord> {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let date = start + Duration::days(i as i64);
                RawRecord::new(date.format("%Y-%m-%d").to_string(), *v)
            })
            .collect()
    }

    #[test]
    fn test_six_points_rejected() {
        let request = ForecastRequest::new("p1", "Widget", daily_records(&[5.0; 6]));
        let err = generate_forecast(&request, today(), &ForecastPolicy::default()).unwrap_err();
        assert_eq!(err, ForecastError::InsufficientData { needed: 7, got: 6 });
        assert!(err.is_data_validation());
    }

    #[test]
    fn test_two_week_growth_is_trending() {
        let values: Vec<f64> = (0..12).map(|i| 20.0 + 4.0 * i as f64).collect();
        let request = ForecastRequest::new("p1", "Widget", daily_records(&values));
        let result = generate_forecast(&request, today(), &ForecastPolicy::default()).unwrap();
        assert_eq!(result.trend, Trend::Increasing);
        assert_eq!(result.confidence_metrics.trend_strength, 0.8);
    }

    #[test]
    fn test_duplicate_dates_count_once() {
        let mut records = daily_records(&[5.0; 6]);
        records.push(records[0].clone());
        let request = ForecastRequest::new("p1", "Widget", records);
        assert!(matches!(
            generate_forecast(&request, today(), &ForecastPolicy::default()),
            Err(ForecastError::InsufficientData { needed: 7, got: 6 })
        ));
    }

    #[test]
    fn test_seven_identical_values() {
        let request = ForecastRequest::new("p1", "Widget", daily_records(&[20.0; 7]));
        let result = generate_forecast(&request, today(), &ForecastPolicy::default()).unwrap();

        assert_eq!(result.trend, Trend::Stable);
        assert_eq!(result.seasonality, Seasonality::Low);
        assert_eq!(result.forecast_data.len(), 30);
        assert!(result.forecast_data.iter().all(|p| p.predicted_demand == 20));
        assert_eq!(result.accuracy, 85.0);
        assert!(!result.accuracy_measured);
        // 20 * 7 * 1.2
        assert_eq!(result.recommended_quantity, 168);
        assert_eq!(result.next_order_date, today() + Duration::days(14));
        assert_eq!(result.forecast_date, today());
        assert_relative_eq!(result.confidence_metrics.data_quality, 7.0 / 30.0);
        assert_relative_eq!(result.confidence_metrics.overall_confidence, 0.85);
        assert_eq!(result.confidence_metrics.trend_strength, 0.6);
        assert_eq!(result.confidence_metrics.seasonality_strength, 0.5);
    }

    #[test]
    fn test_forecast_dates_follow_history() {
        let request =
            ForecastRequest::new("p1", "Widget", daily_records(&[3.0; 10])).with_forecast_days(5);
        let result = generate_forecast(&request, today(), &ForecastPolicy::default()).unwrap();
        let last = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let dates: Vec<NaiveDate> = result.forecast_data.iter().map(|p| p.date).collect();
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[0], last + Duration::days(1));
        assert_eq!(dates[4], last + Duration::days(5));
        assert_eq!(result.next_order_date, today() + Duration::days(2));
    }

    #[test]
    fn test_zero_demand_floors_quantity() {
        let request = ForecastRequest::new("p1", "Widget", daily_records(&[0.0; 10]));
        let result = generate_forecast(&request, today(), &ForecastPolicy::default()).unwrap();
        assert!(result.forecast_data.iter().all(|p| p.predicted_demand == 0));
        assert!(result
            .forecast_data
            .iter()
            .all(|p| (0.6..=1.0).contains(&p.confidence)));
        assert_eq!(result.recommended_quantity, 1);
    }

    #[test]
    fn test_weekly_series_is_seasonal() {
        let week = [10.0, 12.0, 14.0, 30.0, 32.0, 12.0, 10.0];
        let values: Vec<f64> = week.iter().cycle().take(56).copied().collect();
        let request = ForecastRequest::new("p2", "Gadget", daily_records(&values));
        let result = generate_forecast(&request, today(), &ForecastPolicy::default()).unwrap();

        assert_eq!(result.seasonality, Seasonality::High);
        assert!(result.model.contains("multiplicative"));
        assert!(result.accuracy_measured);
        assert!(result.accuracy > 80.0, "accuracy {}", result.accuracy);
        for p in &result.forecast_data {
            assert!((0.6..=1.0).contains(&p.confidence));
        }
    }

    #[test]
    fn test_invalid_parameters() {
        let policy = ForecastPolicy::default();
        let base = ForecastRequest::new("p1", "Widget", daily_records(&[5.0; 10]));

        for days in [0, 366] {
            let req = base.clone().with_forecast_days(days);
            assert!(matches!(
                generate_forecast(&req, today(), &policy),
                Err(ForecastError::InvalidParameter { .. })
            ));
        }
        for width in [0.0, 1.0, -0.5] {
            let req = base.clone().with_confidence_interval(width);
            assert!(req.validate(&policy).is_err());
        }
        assert!(base.clone().with_forecast_days(365).validate(&policy).is_ok());
    }

    #[test]
    fn test_next_order_date() {
        let policy = ForecastPolicy::default();
        assert_eq!(next_order_date(today(), 30, &policy), today() + Duration::days(14));
        assert_eq!(next_order_date(today(), 9, &policy), today() + Duration::days(4));
        assert_eq!(next_order_date(today(), 1, &policy), today());
    }

    #[test]
    fn test_point_confidence_band() {
        let policy = ForecastPolicy::default();
        assert_eq!(point_confidence(10.0, 9.0, 11.0, &policy), 0.6);
        assert_eq!(point_confidence(10.0, 0.0, 30.0, &policy), 1.0);
        assert_relative_eq!(point_confidence(10.0, 6.0, 14.0, &policy), 0.8);
        assert_eq!(point_confidence(-1.0, -5.0, 3.0, &policy), 0.8);
    }

    #[test]
    fn test_seasonality_strength_matches_table() {
        let policy = ForecastPolicy::default();
        for (band, expected) in [
            (Seasonality::High, 0.9),
            (Seasonality::Medium, 0.7),
            (Seasonality::Low, 0.5),
            (Seasonality::None, 0.3),
        ] {
            let patterns = PatternClassification {
                trend: Trend::Increasing,
                seasonality: band,
            };
            let metrics = confidence_metrics(&patterns, 90.0, 60, &policy);
            assert_eq!(metrics.seasonality_strength, expected);
            assert_eq!(metrics.trend_strength, 0.8);
            assert_eq!(metrics.data_quality, 1.0);
        }
    }

    #[test]
    fn test_request_json_defaults() {
        let request: ForecastRequest = serde_json::from_str(
            r#"{"product_id": "p9", "historical_data": [{"date": "2025-01-01", "demand": 4}]}"#,
        )
        .unwrap();
        assert_eq!(request.forecast_days, 30);
        assert_eq!(request.confidence_interval, 0.95);
        assert_eq!(request.product_name, "");
        assert_eq!(request.fallback_price, None);
        assert_eq!(request.historical_data[0].demand, Some(4.0));
    }

    #[test]
    fn test_point_serializes_as_predicted() {
        let point = ForecastPoint {
            date: today(),
            predicted_demand: 12,
            confidence: 0.7,
        };
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["date"], "2025-06-01");
        assert_eq!(json["predicted"], 12);
    }
}
