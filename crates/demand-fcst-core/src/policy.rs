//! Tunable policy values for forecasting and recommendations.
//!
//! None of these are derived from data. They are business heuristics kept
//! in one place so they can be adjusted through configuration without
//! touching the algorithms.

use serde::{Deserialize, Serialize};

use crate::patterns::Seasonality;

/// Policy values used by the forecasting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastPolicy {
    /// Minimum prepared observations required to forecast
    pub min_observations: usize,
    /// Largest accepted forecast horizon in days
    pub max_forecast_days: usize,
    /// Days between placing an order and receiving stock
    pub lead_time_days: f64,
    /// Buffer multiplier applied over lead-time demand
    pub safety_factor: f64,
    /// Upper bound on the days until the suggested next order
    pub max_order_horizon_days: i64,
    /// Accuracy reported when it cannot be measured
    pub default_accuracy: f64,
    /// Minimum observations before a holdout evaluation is attempted
    pub min_accuracy_observations: usize,
    /// Minimum number of held-out points
    pub min_holdout_points: usize,
    /// Share of history used for training in the holdout evaluation
    pub holdout_train_fraction: f64,
    /// Point confidence used when the raw prediction is not positive
    pub default_point_confidence: f64,
    /// Lower bound for point confidence
    pub min_point_confidence: f64,
    /// Upper bound for point confidence
    pub max_point_confidence: f64,
    /// Observation count at which data quality saturates at 1.0
    pub data_quality_saturation: f64,
    /// Changepoint prior scale when the trend is stable
    pub changepoint_prior_stable: f64,
    /// Changepoint prior scale when the trend is moving
    pub changepoint_prior_trending: f64,
    /// Trend strength reported for increasing or decreasing trends
    pub trending_strength: f64,
    /// Trend strength reported for a stable trend
    pub stable_strength: f64,
    /// Seasonality strength reported per band
    pub seasonality_strength: SeasonalityStrengths,
}

impl Default for ForecastPolicy {
    fn default() -> Self {
        Self {
            min_observations: 7,
            max_forecast_days: 365,
            lead_time_days: 7.0,
            safety_factor: 1.2,
            max_order_horizon_days: 14,
            default_accuracy: 85.0,
            min_accuracy_observations: 14,
            min_holdout_points: 3,
            holdout_train_fraction: 0.8,
            default_point_confidence: 0.8,
            min_point_confidence: 0.6,
            max_point_confidence: 1.0,
            data_quality_saturation: 30.0,
            changepoint_prior_stable: 0.05,
            changepoint_prior_trending: 0.1,
            trending_strength: 0.8,
            stable_strength: 0.6,
            seasonality_strength: SeasonalityStrengths::default(),
        }
    }
}

/// Fixed lookup from seasonality band to a reported strength score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityStrengths {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub none: f64,
}

impl Default for SeasonalityStrengths {
    fn default() -> Self {
        Self {
            high: 0.9,
            medium: 0.7,
            low: 0.5,
            none: 0.3,
        }
    }
}

impl SeasonalityStrengths {
    /// Strength score for a seasonality band.
    pub fn for_band(&self, seasonality: Seasonality) -> f64 {
        match seasonality {
            Seasonality::High => self.high,
            Seasonality::Medium => self.medium,
            Seasonality::Low => self.low,
            Seasonality::None => self.none,
        }
    }
}

/// Policy values used by the recommendation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationPolicy {
    /// Days of demand a reorder should cover
    pub reorder_cover_days: f64,
    /// Stock at or below this share of the threshold is urgent
    pub urgent_stock_fraction: f64,
    /// Savings rate applied to the reorder value
    pub reorder_savings_rate: f64,
    /// Days until stockout assumed when demand is zero
    pub default_stockout_days: f64,
    /// Stock above this multiple of the threshold is overstock
    pub overstock_multiple: f64,
    /// Monthly carrying cost as a share of stock value
    pub monthly_carrying_rate: f64,
    /// Average daily demand below this is slow-moving
    pub slow_demand_threshold: f64,
    /// Days since the last order after which slow stock is stale
    pub stale_order_days: f64,
    /// Savings rate applied to the stock value of a promotion
    pub promotion_savings_rate: f64,
    /// Days given to act on a promotion
    pub promotion_action_days: i64,
    pub urgent_reorder_confidence: f64,
    pub reorder_confidence: f64,
    pub optimize_confidence: f64,
    pub promotion_confidence: f64,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            reorder_cover_days: 14.0,
            urgent_stock_fraction: 0.5,
            reorder_savings_rate: 0.1,
            default_stockout_days: 7.0,
            overstock_multiple: 3.0,
            monthly_carrying_rate: 0.02,
            slow_demand_threshold: 0.5,
            stale_order_days: 60.0,
            promotion_savings_rate: 0.1,
            promotion_action_days: 30,
            urgent_reorder_confidence: 0.9,
            reorder_confidence: 0.8,
            optimize_confidence: 0.7,
            promotion_confidence: 0.65,
        }
    }
}
