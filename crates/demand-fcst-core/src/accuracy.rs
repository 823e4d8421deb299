//! Holdout accuracy of the demand model.
//!
//! The trailing share of history is held out, a covariate-free model with
//! weekly seasonality is refitted on the rest, and its error on the held-out
//! dates is converted into an accuracy percentage. Whenever that is not
//! possible the configured default is returned with `measured == false`.

use serde::{Deserialize, Serialize};

use crate::metrics::{accuracy_percentage, bias, coverage, mae, rmse};
use crate::model::{fit_model, ModelConfig};
use crate::policy::ForecastPolicy;
use crate::series::PreparedSeries;

/// Outcome of a holdout evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyEstimate {
    /// Accuracy percentage in [0, 100]
    pub accuracy: f64,
    /// False when `accuracy` is the fixed default rather than a measurement
    pub measured: bool,
    pub mae: Option<f64>,
    pub rmse: Option<f64>,
    /// Mean forecast minus actual on the holdout
    pub bias: Option<f64>,
    /// Share of held-out values inside the model's interval
    pub coverage: Option<f64>,
    pub holdout_points: usize,
}

impl AccuracyEstimate {
    /// The unmeasured default estimate.
    pub fn unmeasured(policy: &ForecastPolicy) -> Self {
        Self {
            accuracy: policy.default_accuracy,
            measured: false,
            mae: None,
            rmse: None,
            bias: None,
            coverage: None,
            holdout_points: 0,
        }
    }
}

/// Estimate model accuracy on a chronological holdout split.
///
/// Falls back to the default estimate when the series is shorter than
/// `min_accuracy_observations`, when the holdout would have fewer than
/// `min_holdout_points` points, when the held-out mean is zero, or when
/// the holdout model cannot be fitted.
pub fn estimate_accuracy(
    series: &PreparedSeries,
    policy: &ForecastPolicy,
    interval_width: f64,
) -> AccuracyEstimate {
    let n = series.len();
    if n < policy.min_accuracy_observations {
        return AccuracyEstimate::unmeasured(policy);
    }

    let split = (n as f64 * policy.holdout_train_fraction) as usize;
    let holdout_points = n.saturating_sub(split);
    if holdout_points < policy.min_holdout_points {
        return AccuracyEstimate::unmeasured(policy);
    }

    let train = series.head(split).without_covariates();
    let test = series.tail_from(split);

    let model = match fit_model(&train, &ModelConfig::holdout(interval_width)) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "holdout fit failed, using default accuracy");
            return AccuracyEstimate::unmeasured(policy);
        }
    };
    let predicted = match model.predict_at(test.dates()) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "holdout prediction failed, using default accuracy");
            return AccuracyEstimate::unmeasured(policy);
        }
    };

    let actual = test.values();
    let accuracy = match accuracy_percentage(actual, &predicted.point) {
        Ok(Some(a)) => a,
        Ok(None) => {
            tracing::debug!("held-out demand is all zero, using default accuracy");
            return AccuracyEstimate::unmeasured(policy);
        }
        Err(e) => {
            tracing::warn!(error = %e, "holdout scoring failed, using default accuracy");
            return AccuracyEstimate::unmeasured(policy);
        }
    };

    AccuracyEstimate {
        accuracy,
        measured: true,
        mae: mae(actual, &predicted.point).ok(),
        rmse: rmse(actual, &predicted.point).ok(),
        bias: bias(actual, &predicted.point).ok(),
        coverage: coverage(actual, &predicted.lower, &predicted.upper).ok(),
        holdout_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
    }

    #[test]
    fn test_short_series_uses_default() {
        let policy = ForecastPolicy::default();
        for n in [1, 7, 13] {
            let series = PreparedSeries::daily(start(), vec![10.0; n]);
            let est = estimate_accuracy(&series, &policy, 0.95);
            assert_eq!(est.accuracy, 85.0);
            assert!(!est.measured);
            assert_eq!(est.holdout_points, 0);
            assert!(est.bias.is_none());
        }
    }

    #[test]
    fn test_constant_series_is_fully_accurate() {
        let series = PreparedSeries::daily(start(), vec![25.0; 30]);
        let est = estimate_accuracy(&series, &ForecastPolicy::default(), 0.95);
        assert!(est.measured);
        assert_eq!(est.holdout_points, 6);
        assert_relative_eq!(est.accuracy, 100.0, epsilon = 0.01);
        assert!(est.mae.unwrap() < 1e-2);
    }

    #[test]
    fn test_level_jump_is_under_forecast() {
        let mut values = vec![10.0; 24];
        values.extend(vec![20.0; 6]);
        let series = PreparedSeries::daily(start(), values);
        let est = estimate_accuracy(&series, &ForecastPolicy::default(), 0.95);
        assert!(est.measured);
        assert_relative_eq!(est.bias.unwrap(), -10.0, epsilon = 0.1);
        assert_relative_eq!(est.accuracy, 50.0, epsilon = 0.5);
    }

    #[test]
    fn test_zero_holdout_mean_uses_default() {
        let mut values = vec![5.0; 24];
        values.extend(vec![0.0; 6]);
        let series = PreparedSeries::daily(start(), values);
        let est = estimate_accuracy(&series, &ForecastPolicy::default(), 0.95);
        assert!(!est.measured);
        assert_eq!(est.accuracy, 85.0);
    }

    #[test]
    fn test_noisy_series_is_within_range() {
        let values: Vec<f64> = (0..50)
            .map(|i| 30.0 + ((i * 37) % 11) as f64 - 5.0)
            .collect();
        let series = PreparedSeries::daily(start(), values);
        let est = estimate_accuracy(&series, &ForecastPolicy::default(), 0.95);
        assert!(est.measured);
        assert!((0.0..=100.0).contains(&est.accuracy));
        assert_eq!(est.holdout_points, 10);
        let cov = est.coverage.unwrap();
        assert!((0.0..=1.0).contains(&cov));
    }

    #[test]
    fn test_holdout_minimum_from_policy() {
        let policy = ForecastPolicy {
            min_holdout_points: 10,
            ..Default::default()
        };
        let series = PreparedSeries::daily(start(), vec![8.0; 20]);
        assert!(!estimate_accuracy(&series, &policy, 0.95).measured);
    }
}
