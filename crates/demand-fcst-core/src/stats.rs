//! Descriptive statistics over demand series.
//!
//! Standard deviations are sample (n - 1) deviations throughout.

use statrs::statistics::Statistics;

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().mean())
}

/// Sample standard deviation, or `None` with fewer than two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.iter().std_dev())
}

/// Rolling mean over complete windows.
///
/// Returns `values.len() - window + 1` points, the i-th being the mean of
/// `values[i..i + window]`. Empty when the series is shorter than the window.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut sum: f64 = values[..window].iter().sum();
    out.push(sum / window as f64);

    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out.push(sum / window as f64);
    }
    out
}

/// Rolling sample standard deviation over complete windows.
///
/// Computed per window rather than incrementally so long flat stretches
/// do not accumulate cancellation error.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    if window < 2 || values.len() < window {
        return Vec::new();
    }

    values
        .windows(window)
        .map(|w| {
            let m = w.iter().sum::<f64>() / window as f64;
            let ss: f64 = w.iter().map(|v| (v - m).powi(2)).sum();
            (ss / (window - 1) as f64).sqrt()
        })
        .collect()
}
