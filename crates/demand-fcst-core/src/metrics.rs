//! Error metrics for holdout evaluation.
//!
//! - **Scale-dependent**: MAE, MSE, RMSE, Bias
//! - **Relative**: accuracy percentage (MAE relative to mean demand)
//! - **Interval**: coverage of the uncertainty bounds

use crate::error::{ForecastError, Result};

/// Mean of `f(actual_i, forecast_i)` over aligned pairs.
fn paired_mean(actual: &[f64], forecast: &[f64], f: impl Fn(f64, f64) -> f64) -> Result<f64> {
    check_aligned(actual, forecast)?;
    let total: f64 = actual.iter().zip(forecast).map(|(&a, &p)| f(a, p)).sum();
    Ok(total / actual.len() as f64)
}

/// Mean absolute error, `mean(|actual - forecast|)`.
///
/// # Example
/// ```
/// use demand_fcst_core::metrics::mae;
/// let actual = vec![10.0, 12.0, 14.0];
/// let forecast = vec![11.0, 12.0, 12.0];
/// assert!((mae(&actual, &forecast).unwrap() - 1.0).abs() < 1e-12);
/// ```
pub fn mae(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    paired_mean(actual, forecast, |a, p| (a - p).abs())
}

pub fn mse(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    paired_mean(actual, forecast, |a, p| (a - p) * (a - p))
}

/// Root mean squared error, in demand units.
pub fn rmse(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    mse(actual, forecast).map(f64::sqrt)
}

/// Mean forecast minus actual; positive when the model over-forecasts.
pub fn bias(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    paired_mean(actual, forecast, |a, p| p - a)
}

/// Accuracy percentage: `100 - MAE / mean(actual) * 100`, clamped to [0, 100].
///
/// Returns `None` when the mean of the actual values is zero, where the
/// ratio is undefined.
pub fn accuracy_percentage(actual: &[f64], forecast: &[f64]) -> Result<Option<f64>> {
    let error = mae(actual, forecast)?;
    let mean_actual = actual.iter().sum::<f64>() / actual.len() as f64;
    if mean_actual == 0.0 {
        return Ok(None);
    }
    let accuracy = 100.0 - error / mean_actual * 100.0;
    Ok(Some(accuracy.clamp(0.0, 100.0)))
}

/// Fraction of actual values inside `[lower, upper]`.
pub fn coverage(actual: &[f64], lower: &[f64], upper: &[f64]) -> Result<f64> {
    check_aligned(actual, lower)?;
    check_aligned(actual, upper)?;
    let inside = actual
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .filter(|(a, (lo, hi))| *a >= *lo && *a <= *hi)
        .count();
    Ok(inside as f64 / actual.len() as f64)
}

fn check_aligned(actual: &[f64], other: &[f64]) -> Result<()> {
    if other.len() != actual.len() {
        Err(ForecastError::InvalidParameter {
            param: "forecast".to_string(),
            value: other.len().to_string(),
            reason: format!("length must match actual ({})", actual.len()),
        })
    } else if actual.is_empty() {
        Err(ForecastError::InsufficientData { needed: 1, got: 0 })
    } else {
        Ok(())
    }
}
