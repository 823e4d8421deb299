//! Preparation of raw historical records into a uniform daily series.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// A historical record as delivered by the caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub date: Option<String>,
    pub demand: Option<f64>,
    pub price: Option<f64>,
    pub promotion: Option<bool>,
}

impl RawRecord {
    /// Record with only the mandatory fields.
    pub fn new(date: impl Into<String>, demand: f64) -> Self {
        Self {
            date: Some(date.into()),
            demand: Some(demand),
            price: None,
            promotion: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_promotion(mut self, promotion: bool) -> Self {
        self.promotion = Some(promotion);
        self
    }
}

/// A validated historical observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub date: NaiveDate,
    pub demand: f64,
    pub price: Option<f64>,
    pub promotion: Option<bool>,
}

/// External covariates a series may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Covariate {
    Price,
    Promotion,
}

impl Covariate {
    pub fn name(&self) -> &'static str {
        match self {
            Covariate::Price => "price",
            Covariate::Promotion => "promotion",
        }
    }
}

/// Demand observations sorted by date with no duplicate dates.
///
/// Covariate columns, when present, have one value per observation;
/// promotion is encoded as 0.0 / 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    price: Option<Vec<f64>>,
    promotion: Option<Vec<f64>>,
}

impl PreparedSeries {
    /// Consecutive daily series starting at `start`, without covariates.
    pub fn daily(start: NaiveDate, values: Vec<f64>) -> Self {
        let dates = (0..values.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        Self {
            dates,
            values,
            price: None,
            promotion: None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Observed demand values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn price(&self) -> Option<&[f64]> {
        self.price.as_deref()
    }

    pub fn promotion(&self) -> Option<&[f64]> {
        self.promotion.as_deref()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn has_covariates(&self) -> bool {
        self.price.is_some() || self.promotion.is_some()
    }

    /// Covariate columns present on this series, in a fixed order.
    pub fn covariates(&self) -> Vec<(Covariate, &[f64])> {
        let mut out = Vec::with_capacity(2);
        if let Some(p) = self.price.as_deref() {
            out.push((Covariate::Price, p));
        }
        if let Some(p) = self.promotion.as_deref() {
            out.push((Covariate::Promotion, p));
        }
        out
    }

    /// Value a covariate is held at over the forecast horizon.
    ///
    /// Price stays at its last observed value and promotions are assumed off.
    pub fn future_value(&self, covariate: Covariate) -> f64 {
        match covariate {
            Covariate::Price => self
                .price
                .as_ref()
                .and_then(|p| p.last().copied())
                .unwrap_or(0.0),
            Covariate::Promotion => 0.0,
        }
    }

    /// Same observations with all covariate columns removed.
    pub fn without_covariates(&self) -> Self {
        Self {
            dates: self.dates.clone(),
            values: self.values.clone(),
            price: None,
            promotion: None,
        }
    }

    /// The first `n` observations.
    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            dates: self.dates[..n].to_vec(),
            values: self.values[..n].to_vec(),
            price: self.price.as_ref().map(|p| p[..n].to_vec()),
            promotion: self.promotion.as_ref().map(|p| p[..n].to_vec()),
        }
    }

    /// The observations from index `start` on.
    pub fn tail_from(&self, start: usize) -> Self {
        let start = start.min(self.len());
        Self {
            dates: self.dates[start..].to_vec(),
            values: self.values[start..].to_vec(),
            price: self.price.as_ref().map(|p| p[start..].to_vec()),
            promotion: self.promotion.as_ref().map(|p| p[start..].to_vec()),
        }
    }
}

/// Parse a calendar date, keeping only the date part of timestamps.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps, and naive
/// `YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD HH:MM:SS` timestamps.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    Err(ForecastError::InvalidDateFormat(format!(
        "'{}' is not a recognised date",
        s
    )))
}

/// Validate a single raw record.
fn validate_record(index: usize, record: &RawRecord) -> Result<HistoricalRecord> {
    let date_str = record
        .date
        .as_deref()
        .ok_or_else(|| ForecastError::InvalidData(format!("record {} is missing 'date'", index)))?;
    let date = parse_date(date_str).map_err(|_| {
        ForecastError::InvalidDateFormat(format!("record {}: '{}'", index, date_str))
    })?;

    let demand = record.demand.ok_or_else(|| {
        ForecastError::InvalidData(format!("record {} is missing 'demand'", index))
    })?;
    if !demand.is_finite() || demand < 0.0 {
        return Err(ForecastError::InvalidData(format!(
            "record {} has invalid demand {}",
            index, demand
        )));
    }

    if let Some(price) = record.price {
        if !price.is_finite() || price < 0.0 {
            return Err(ForecastError::InvalidData(format!(
                "record {} has invalid price {}",
                index, price
            )));
        }
    }

    Ok(HistoricalRecord {
        date,
        demand,
        price: record.price,
        promotion: record.promotion,
    })
}

/// Fill missing prices from the fallback, else forward, else backward.
fn fill_prices(prices: &[Option<f64>], fallback: Option<f64>) -> Vec<f64> {
    if let Some(fb) = fallback {
        return prices.iter().map(|p| p.unwrap_or(fb)).collect();
    }

    let first_observed = prices.iter().flatten().next().copied().unwrap_or(0.0);
    let mut last = first_observed;
    prices
        .iter()
        .map(|p| {
            if let Some(v) = p {
                last = *v;
            }
            last
        })
        .collect()
}

/// Prepare raw records into a sorted, deduplicated series.
///
/// Records sharing a date collapse to the one that appears last in the
/// input. A price column is kept when any record carries a price and a
/// promotion column when any record carries the flag.
///
/// # Errors
/// * `InsufficientData` when `records` is empty
/// * `InvalidData` for missing fields or negative / non-finite values
/// * `InvalidDateFormat` for unparsable dates
pub fn prepare_series(records: &[RawRecord], fallback_price: Option<f64>) -> Result<PreparedSeries> {
    if records.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }

    if let Some(fb) = fallback_price {
        if !fb.is_finite() || fb < 0.0 {
            return Err(ForecastError::InvalidParameter {
                param: "unit_price".to_string(),
                value: fb.to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
    }

    let mut by_date: BTreeMap<NaiveDate, HistoricalRecord> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        let validated = validate_record(i, record)?;
        by_date.insert(validated.date, validated);
    }

    let deduped: Vec<HistoricalRecord> = by_date.into_values().collect();

    let has_price = deduped.iter().any(|r| r.price.is_some());
    let has_promotion = deduped.iter().any(|r| r.promotion.is_some());

    let price = if has_price {
        let raw: Vec<Option<f64>> = deduped.iter().map(|r| r.price).collect();
        Some(fill_prices(&raw, fallback_price))
    } else {
        None
    };

    let promotion = if has_promotion {
        Some(
            deduped
                .iter()
                .map(|r| if r.promotion.unwrap_or(false) { 1.0 } else { 0.0 })
                .collect(),
        )
    } else {
        None
    };

    Ok(PreparedSeries {
        dates: deduped.iter().map(|r| r.date).collect(),
        values: deduped.iter().map(|r| r.demand).collect(),
        price,
        promotion,
    })
}
