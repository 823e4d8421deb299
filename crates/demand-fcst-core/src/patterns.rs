//! Trend and seasonality classification of demand series.
//!
//! The classification is a set of moving-average heuristics rather than a
//! statistical test. It drives how the demand model is configured and feeds
//! the confidence metrics of a forecast.

use serde::{Deserialize, Serialize};

use crate::series::PreparedSeries;
use crate::stats::{mean, rolling_mean, rolling_std, std_dev};

/// Observations below which no pattern is detected at all.
pub const MIN_PATTERN_OBSERVATIONS: usize = 7;
/// Observations needed for a measured seasonality band (four weeks).
pub const MIN_SEASONALITY_OBSERVATIONS: usize = 28;
/// Window of the short moving average (one week).
pub const SHORT_WINDOW: usize = 7;
/// Window of the long moving average (two weeks).
pub const LONG_WINDOW: usize = 14;
/// Moving-average points compared by the trend signal (two blocks of five).
pub const TREND_BLOCK: usize = 5;
/// Absolute trend signal beyond which the trend is not stable.
pub const TREND_THRESHOLD: f64 = 0.1;

/// Direction of recent demand movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        }
    }
}

/// Strength of the recurring weekly pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seasonality {
    None,
    Low,
    Medium,
    High,
}

impl Seasonality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seasonality::None => "none",
            Seasonality::Low => "low",
            Seasonality::Medium => "medium",
            Seasonality::High => "high",
        }
    }

    /// Band for a ratio of mean weekly deviation to overall deviation.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.7 {
            Seasonality::High
        } else if ratio > 0.4 {
            Seasonality::Medium
        } else if ratio > 0.2 {
            Seasonality::Low
        } else {
            Seasonality::None
        }
    }
}

/// Trend and seasonality of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternClassification {
    pub trend: Trend,
    pub seasonality: Seasonality,
}

impl Default for PatternClassification {
    fn default() -> Self {
        Self {
            trend: Trend::Stable,
            seasonality: Seasonality::None,
        }
    }
}

/// Classification together with the signals it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternAnalysis {
    pub classification: PatternClassification,
    /// Mean short MA over the last five positions minus the five before them
    pub trend_signal: f64,
    /// Weekly-to-overall deviation ratio, `None` when not measured
    pub seasonality_ratio: Option<f64>,
    /// Most recent 7-period moving average
    pub short_ma_last: Option<f64>,
    /// Most recent 14-period moving average (7-period when too short)
    pub long_ma_last: Option<f64>,
}

/// Recent movement of the short moving average.
///
/// `short_ma[j]` is the weekly mean ending at observation `j + 6`. The two
/// blocks are the last five observation positions and the five before
/// them; each block averages whichever of its positions already have a
/// complete window. Zero under ten observations or when the earlier block
/// has no complete window yet (fewer than twelve observations).
fn trend_signal(observations: usize, short_ma: &[f64]) -> f64 {
    if observations < 2 * TREND_BLOCK {
        return 0.0;
    }
    let first = SHORT_WINDOW - 1;
    let block_mean = |from: usize, to: usize| -> Option<f64> {
        let from = from.max(first);
        if from >= to {
            return None;
        }
        mean(&short_ma[from - first..to - first])
    };

    let recent = block_mean(observations - TREND_BLOCK, observations);
    let previous = block_mean(observations - 2 * TREND_BLOCK, observations - TREND_BLOCK);
    match (recent, previous) {
        (Some(r), Some(p)) => r - p,
        _ => 0.0,
    }
}

fn classify_trend(signal: f64) -> Trend {
    if signal > TREND_THRESHOLD {
        Trend::Increasing
    } else if signal < -TREND_THRESHOLD {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Mean rolling weekly deviation relative to the overall deviation.
///
/// A flat series has no overall deviation and yields a ratio of 0.
fn seasonality_ratio(values: &[f64]) -> f64 {
    let overall = std_dev(values).unwrap_or(0.0);
    if overall <= 0.0 {
        return 0.0;
    }
    let weekly = mean(&rolling_std(values, SHORT_WINDOW)).unwrap_or(0.0);
    weekly / overall
}

/// Analyze the demand pattern of a raw value sequence.
pub fn analyze_values(values: &[f64]) -> PatternAnalysis {
    if values.len() < MIN_PATTERN_OBSERVATIONS {
        return PatternAnalysis {
            classification: PatternClassification::default(),
            trend_signal: 0.0,
            seasonality_ratio: None,
            short_ma_last: None,
            long_ma_last: None,
        };
    }

    let short_ma = rolling_mean(values, SHORT_WINDOW);
    let long_ma = if values.len() >= LONG_WINDOW {
        rolling_mean(values, LONG_WINDOW)
    } else {
        short_ma.clone()
    };

    let signal = trend_signal(values.len(), &short_ma);
    let trend = classify_trend(signal);

    // Under four weeks the band is a documented default, not a measurement
    let (seasonality, ratio) = if values.len() >= MIN_SEASONALITY_OBSERVATIONS {
        let ratio = seasonality_ratio(values);
        (Seasonality::from_ratio(ratio), Some(ratio))
    } else {
        (Seasonality::Low, None)
    };

    PatternAnalysis {
        classification: PatternClassification { trend, seasonality },
        trend_signal: signal,
        seasonality_ratio: ratio,
        short_ma_last: short_ma.last().copied(),
        long_ma_last: long_ma.last().copied(),
    }
}

/// Analyze the demand pattern of a prepared series.
pub fn analyze_patterns(series: &PreparedSeries) -> PatternAnalysis {
    analyze_values(series.values())
}

/// Classify the trend and seasonality of a prepared series.
pub fn detect_patterns(series: &PreparedSeries) -> PatternClassification {
    analyze_patterns(series).classification
}
