//! Decomposable demand model fitted by penalised least squares.
//!
//! The model follows the additive / multiplicative decomposition popular for
//! daily business series:
//!
//! ```text
//! additive:        y(t) = g(t) + s(t) + Σ β_j x_j(t)
//! multiplicative:  y(t) = g(t) · (1 + s(t) + Σ β_j x_j(t))
//! ```
//!
//! where `g` is a piecewise-linear trend with changepoints spread over the
//! first 80% of history, `s` a weekly Fourier series keyed on the weekday of
//! each calendar date, and `x_j` the standardised covariates (price,
//! promotion). Changepoint, seasonal, and covariate coefficients carry ridge
//! penalties inversely proportional to their squared prior scales, so a
//! larger changepoint prior lets the trend bend more readily. Yearly and
//! daily components are not modelled.
//!
//! The penalised problem is solved as an ordinary least-squares fit on an
//! augmented design matrix (one extra row per penalised coefficient).

use std::f64::consts::PI;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{ForecastError, Result};
use crate::patterns::{PatternClassification, Seasonality, Trend};
use crate::policy::ForecastPolicy;
use crate::series::{Covariate, PreparedSeries};
use crate::stats::{mean, std_dev};

/// Noise variance (in scaled units) that converts prior scales into ridge penalties.
const PRIOR_NOISE_VARIANCE: f64 = 1e-3;
/// Prior scale of the base growth rate.
const SLOPE_PRIOR_SCALE: f64 = 5.0;
/// Covariates whose deviation is below this are treated as constant.
const MIN_COVARIATE_STD: f64 = 1e-9;
const WEEK_DAYS: f64 = 7.0;

/// How seasonal and covariate effects combine with the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    Additive,
    Multiplicative,
}

/// Demand model configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub seasonality_mode: SeasonalityMode,
    /// Include the weekly Fourier component
    pub weekly_seasonality: bool,
    /// Number of sine/cosine pairs in the weekly component
    pub weekly_fourier_order: usize,
    /// Changepoint sensitivity; larger values bend the trend more easily
    pub changepoint_prior_scale: f64,
    /// Maximum number of potential changepoints
    pub n_changepoints: usize,
    /// Share of history in which changepoints may be placed
    pub changepoint_range: f64,
    pub seasonality_prior_scale: f64,
    pub covariate_prior_scale: f64,
    /// Width of the uncertainty interval (0-1)
    pub interval_width: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            seasonality_mode: SeasonalityMode::Additive,
            weekly_seasonality: true,
            weekly_fourier_order: 3,
            changepoint_prior_scale: 0.05,
            n_changepoints: 25,
            changepoint_range: 0.8,
            seasonality_prior_scale: 10.0,
            covariate_prior_scale: 10.0,
            interval_width: 0.95,
        }
    }
}

impl ModelConfig {
    /// Configuration derived from detected patterns.
    ///
    /// Medium and high seasonality switch to multiplicative effects, no
    /// seasonality disables the weekly component, and a moving trend gets
    /// the larger changepoint prior.
    pub fn from_patterns(
        patterns: &PatternClassification,
        interval_width: f64,
        policy: &ForecastPolicy,
    ) -> Self {
        let seasonality_mode = match patterns.seasonality {
            Seasonality::High | Seasonality::Medium => SeasonalityMode::Multiplicative,
            Seasonality::Low | Seasonality::None => SeasonalityMode::Additive,
        };
        let changepoint_prior_scale = if patterns.trend == Trend::Stable {
            policy.changepoint_prior_stable
        } else {
            policy.changepoint_prior_trending
        };

        Self {
            seasonality_mode,
            weekly_seasonality: patterns.seasonality != Seasonality::None,
            changepoint_prior_scale,
            interval_width,
            ..Default::default()
        }
    }

    /// Fixed configuration used for holdout evaluation.
    pub fn holdout(interval_width: f64) -> Self {
        Self {
            interval_width,
            ..Default::default()
        }
    }
}

/// Point forecasts with uncertainty bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelForecast {
    pub dates: Vec<NaiveDate>,
    pub point: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ModelForecast {
    pub fn len(&self) -> usize {
        self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }
}

/// Standardisation of one covariate column.
#[derive(Debug, Clone, PartialEq)]
struct CovariateScale {
    covariate: Covariate,
    mean: f64,
    std: f64,
    /// Standardised value held over the forecast horizon
    future: f64,
}

/// A fitted demand model.
#[derive(Debug, Clone)]
pub struct FittedModel {
    config: ModelConfig,
    start: NaiveDate,
    last_date: NaiveDate,
    span_days: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    covariates: Vec<CovariateScale>,
    /// Trend-only coefficients used to scale multiplicative effects
    trend_coef: Option<Vec<f64>>,
    coef: Vec<f64>,
    fitted: Vec<f64>,
    sigma: f64,
    n_obs: usize,
    z: f64,
}

/// A fitted model and whether covariates had to be stripped to obtain it.
#[derive(Debug, Clone)]
pub struct ModelFit {
    pub model: FittedModel,
    pub covariates_stripped: bool,
}

// ============================================================================
// Design matrix construction
// ============================================================================

/// Changepoint locations in scaled time.
///
/// Evenly spaced over the first `changepoint_range` of the observations,
/// never at the first one.
fn place_changepoints(t: &[f64], config: &ModelConfig) -> Vec<f64> {
    let hist_size = (t.len() as f64 * config.changepoint_range).floor() as usize;
    if hist_size < 2 || config.n_changepoints == 0 {
        return Vec::new();
    }
    let k = config.n_changepoints.min(hist_size - 1);
    let last = (hist_size - 1) as f64;

    (1..=k)
        .map(|i| {
            let idx = (last * i as f64 / k as f64).round() as usize;
            t[idx.min(t.len() - 1)]
        })
        .collect()
}

fn trend_row(t: f64, changepoints: &[f64]) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len());
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|&c| (t - c).max(0.0)));
    row
}

fn trend_penalties(config: &ModelConfig, n_changepoints: usize) -> Vec<f64> {
    let mut pen = Vec::with_capacity(2 + n_changepoints);
    pen.push(0.0);
    pen.push(PRIOR_NOISE_VARIANCE / SLOPE_PRIOR_SCALE.powi(2));
    pen.extend(
        std::iter::repeat(PRIOR_NOISE_VARIANCE / config.changepoint_prior_scale.powi(2))
            .take(n_changepoints),
    );
    pen
}

/// Weekly Fourier terms keyed on the weekday of `date`.
fn weekly_terms(date: NaiveDate, order: usize) -> Vec<f64> {
    let day = date.num_days_from_ce() as f64;
    let mut terms = Vec::with_capacity(2 * order);
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * day / WEEK_DAYS;
        terms.push(angle.sin());
        terms.push(angle.cos());
    }
    terms
}

fn dot(row: &[f64], coef: &[f64]) -> f64 {
    row.iter().zip(coef.iter()).map(|(x, b)| x * b).sum()
}

/// Solve a ridge-penalised least-squares problem.
///
/// Penalised columns get an extra row `sqrt(λ_j) · e_j` with target 0, so
/// the augmented system is an ordinary least-squares fit.
fn solve_penalized(rows: &[Vec<f64>], y: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    use anofox_regression::prelude::*;

    let n = rows.len();
    let p = penalties.len();
    let penalized: Vec<usize> = (0..p).filter(|&j| penalties[j] > 0.0).collect();
    let m = n + penalized.len();

    let x_mat = faer::Mat::from_fn(m, p, |i, j| {
        if i < n {
            rows[i][j]
        } else if penalized[i - n] == j {
            penalties[j].sqrt()
        } else {
            0.0
        }
    });
    let y_col = faer::Col::from_fn(m, |i| if i < n { y[i] } else { 0.0 });

    let fitted = OlsRegressor::builder()
        .with_intercept(false)
        .build()
        .fit(&x_mat, &y_col)
        .map_err(|e| ForecastError::ModelFit(format!("least-squares solve failed: {:?}", e)))?;

    let coeffs_col = fitted.coefficients();
    let mut coef = Vec::with_capacity(p);
    for i in 0..coeffs_col.nrows() {
        coef.push(coeffs_col[i]);
    }

    if coef.len() != p || coef.iter().any(|c| !c.is_finite()) {
        return Err(ForecastError::ModelFit(
            "degenerate design produced non-finite coefficients".to_string(),
        ));
    }
    Ok(coef)
}

// ============================================================================
// Fitting
// ============================================================================

/// Fit the demand model to a prepared series.
///
/// Covariates with zero variance carry no information and are dropped.
///
/// # Errors
/// `ModelFit` when the series has fewer than two observations, contains
/// non-finite values, or the least-squares solve fails.
pub fn fit_model(series: &PreparedSeries, config: &ModelConfig) -> Result<FittedModel> {
    let n = series.len();
    if n < 2 {
        return Err(ForecastError::ModelFit(format!(
            "at least 2 observations required, got {}",
            n
        )));
    }
    if !(config.interval_width > 0.0 && config.interval_width < 1.0) {
        return Err(ForecastError::InvalidParameter {
            param: "interval_width".to_string(),
            value: config.interval_width.to_string(),
            reason: "must be between 0 and 1".to_string(),
        });
    }

    let values = series.values();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::ModelFit(
            "series contains non-finite values".to_string(),
        ));
    }

    let dates = series.dates();
    let start = dates[0];
    let last_date = dates[n - 1];
    let span_days = (last_date - start).num_days() as f64;
    if span_days <= 0.0 {
        return Err(ForecastError::ModelFit(
            "observations must span more than one date".to_string(),
        ));
    }

    let y_scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };
    let y: Vec<f64> = values.iter().map(|v| v / y_scale).collect();

    let t: Vec<f64> = dates
        .iter()
        .map(|d| (*d - start).num_days() as f64 / span_days)
        .collect();
    let changepoints = place_changepoints(&t, config);

    let mut covariates = Vec::new();
    let mut covariate_columns: Vec<Vec<f64>> = Vec::new();
    for (covariate, column) in series.covariates() {
        let std = std_dev(column).unwrap_or(0.0);
        if std < MIN_COVARIATE_STD {
            tracing::debug!(covariate = covariate.name(), "dropping constant covariate");
            continue;
        }
        let m = mean(column).unwrap_or(0.0);
        covariates.push(CovariateScale {
            covariate,
            mean: m,
            std,
            future: (series.future_value(covariate) - m) / std,
        });
        covariate_columns.push(column.iter().map(|v| (v - m) / std).collect());
    }

    let fourier_order = if config.weekly_seasonality {
        config.weekly_fourier_order
    } else {
        0
    };

    let trend_rows: Vec<Vec<f64>> = t.iter().map(|&ti| trend_row(ti, &changepoints)).collect();
    let base_penalties = trend_penalties(config, changepoints.len());

    // Multiplicative effects scale with the trend, estimated on its own first
    let (trend_coef, scale): (Option<Vec<f64>>, Vec<f64>) = match config.seasonality_mode {
        SeasonalityMode::Additive => (None, vec![1.0; n]),
        SeasonalityMode::Multiplicative => {
            let coef = solve_penalized(&trend_rows, &y, &base_penalties)?;
            let g = trend_rows.iter().map(|row| dot(row, &coef)).collect();
            (Some(coef), g)
        }
    };

    let mut penalties = base_penalties;
    penalties.extend(
        std::iter::repeat(PRIOR_NOISE_VARIANCE / config.seasonality_prior_scale.powi(2))
            .take(2 * fourier_order),
    );
    penalties.extend(
        std::iter::repeat(PRIOR_NOISE_VARIANCE / config.covariate_prior_scale.powi(2))
            .take(covariates.len()),
    );

    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let mut row = trend_rows[i].clone();
            row.extend(
                weekly_terms(dates[i], fourier_order)
                    .into_iter()
                    .map(|v| v * scale[i]),
            );
            row.extend(covariate_columns.iter().map(|col| col[i] * scale[i]));
            row
        })
        .collect();

    let coef = solve_penalized(&rows, &y, &penalties)?;

    let fitted_scaled: Vec<f64> = rows.iter().map(|row| dot(row, &coef)).collect();
    let sse: f64 = y
        .iter()
        .zip(fitted_scaled.iter())
        .map(|(a, f)| (a - f).powi(2))
        .sum();
    let sigma = (sse / n as f64).sqrt();

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::InternalError(format!("standard normal: {}", e)))?;
    let z = normal.inverse_cdf(0.5 + config.interval_width / 2.0);

    tracing::debug!(
        observations = n,
        changepoints = changepoints.len(),
        covariates = covariates.len(),
        mode = ?config.seasonality_mode,
        sigma = sigma * y_scale,
        "fitted demand model"
    );

    Ok(FittedModel {
        config: config.clone(),
        start,
        last_date,
        span_days,
        y_scale,
        changepoints,
        covariates,
        trend_coef,
        coef,
        fitted: fitted_scaled.iter().map(|v| v * y_scale).collect(),
        sigma,
        n_obs: n,
        z,
    })
}

/// Fit the model, retrying once without covariates when the first fit fails.
///
/// A failure of the covariate-free fit is returned as-is.
pub fn fit_with_fallback(series: &PreparedSeries, config: &ModelConfig) -> Result<ModelFit> {
    fit_with_fallback_using(series, config, fit_model)
}

fn fit_with_fallback_using<F>(series: &PreparedSeries, config: &ModelConfig, fit: F) -> Result<ModelFit>
where
    F: Fn(&PreparedSeries, &ModelConfig) -> Result<FittedModel>,
{
    match fit(series, config) {
        Ok(model) => Ok(ModelFit {
            model,
            covariates_stripped: false,
        }),
        Err(ForecastError::ModelFit(reason)) if series.has_covariates() => {
            tracing::warn!(%reason, "model fit failed, retrying without covariates");
            let model = fit(&series.without_covariates(), config)?;
            Ok(ModelFit {
                model,
                covariates_stripped: true,
            })
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// Prediction
// ============================================================================

impl FittedModel {
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// In-sample fitted values in original units.
    pub fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    /// In-sample residual standard deviation in original units.
    pub fn sigma(&self) -> f64 {
        self.sigma * self.y_scale
    }

    /// Covariates that entered the model.
    pub fn covariates(&self) -> Vec<Covariate> {
        self.covariates.iter().map(|c| c.covariate).collect()
    }

    /// Short human-readable model description.
    pub fn description(&self) -> String {
        let mut parts = vec![format!(
            "trend({} changepoints)",
            self.changepoints.len()
        )];
        if self.config.weekly_seasonality {
            parts.push(format!("weekly({})", self.config.weekly_fourier_order));
        }
        for c in &self.covariates {
            parts.push(c.covariate.name().to_string());
        }
        let mode = match self.config.seasonality_mode {
            SeasonalityMode::Additive => "additive",
            SeasonalityMode::Multiplicative => "multiplicative",
        };
        format!("{} [{}]", parts.join(" + "), mode)
    }

    /// Forecast `horizon` consecutive days after the last observation.
    pub fn forecast(&self, horizon: usize) -> Result<ModelForecast> {
        let dates: Vec<NaiveDate> = (1..=horizon)
            .map(|h| self.last_date + Duration::days(h as i64))
            .collect();
        self.predict_at(&dates)
    }

    /// Predict at arbitrary dates.
    ///
    /// Covariates are held at their horizon values (last price, no
    /// promotion) for every requested date.
    pub fn predict_at(&self, dates: &[NaiveDate]) -> Result<ModelForecast> {
        let fourier_order = if self.config.weekly_seasonality {
            self.config.weekly_fourier_order
        } else {
            0
        };

        let mut point = Vec::with_capacity(dates.len());
        let mut lower = Vec::with_capacity(dates.len());
        let mut upper = Vec::with_capacity(dates.len());

        for &date in dates {
            let t = (date - self.start).num_days() as f64 / self.span_days;
            let trend = trend_row(t, &self.changepoints);
            let scale = match &self.trend_coef {
                Some(tc) => dot(&trend, tc),
                None => 1.0,
            };

            let mut row = trend;
            row.extend(
                weekly_terms(date, fourier_order)
                    .into_iter()
                    .map(|v| v * scale),
            );
            row.extend(self.covariates.iter().map(|c| c.future * scale));

            let yhat = dot(&row, &self.coef) * self.y_scale;
            if !yhat.is_finite() {
                return Err(ForecastError::ModelFit(format!(
                    "non-finite prediction for {}",
                    date
                )));
            }

            // Uncertainty widens with the distance past the last observation
            let steps = (date - self.last_date).num_days().max(0) as f64;
            let half_width =
                self.z * self.sigma * self.y_scale * (1.0 + steps / self.n_obs as f64).sqrt();

            point.push(yhat);
            lower.push(yhat - half_width);
            upper.push(yhat + half_width);
        }

        Ok(ModelForecast {
            dates: dates.to_vec(),
            point,
            lower,
            upper,
        })
    }
}
