//! Storage seam for the batch driver.
//!
//! The core never performs I/O. Products, history and persisted forecasts
//! go through [`ForecastRepository`], with [`InMemoryRepository`] as the
//! implementation used by tests and the command-line batch mode.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use demand_fcst_core::{parse_date, ForecastResult, RawRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// An active product to forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    /// Fallback price for records without one
    #[serde(default)]
    pub unit_price: Option<f64>,
}

#[async_trait]
pub trait ForecastRepository: Send + Sync {
    /// Products that should be forecast in a batch run.
    async fn fetch_active_products(&self) -> Result<Vec<ProductRef>, RepositoryError>;

    /// Historical records of a product with `start <= date <= end`.
    async fn fetch_historical_range(
        &self,
        product_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRecord>, RepositoryError>;

    /// Store a forecast keyed by product and forecast date.
    async fn persist_forecast(
        &self,
        product_id: &str,
        result: &ForecastResult,
    ) -> Result<(), RepositoryError>;
}

/// A persisted forecast with its expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredForecast {
    pub product_id: String,
    pub forecast_date: NaiveDate,
    pub expires_at: NaiveDate,
    pub result: ForecastResult,
}

/// Seed data for one product of an [`InMemoryRepository`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedProduct {
    #[serde(flatten)]
    pub product: ProductRef,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub history: Vec<RawRecord>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Default)]
struct Store {
    products: BTreeMap<String, (ProductRef, bool)>,
    history: HashMap<String, Vec<RawRecord>>,
    forecasts: BTreeMap<(String, NaiveDate), StoredForecast>,
}

/// Repository held in memory.
#[derive(Debug)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
    retention_days: i64,
}

impl InMemoryRepository {
    pub fn new(retention_days: i64) -> Self {
        Self {
            store: RwLock::new(Store::default()),
            retention_days,
        }
    }

    /// Repository pre-filled with products and their history.
    pub fn from_seed(seed: Vec<SeedProduct>, retention_days: i64) -> Self {
        let mut store = Store::default();
        for s in seed {
            let id = s.product.product_id.clone();
            store.history.insert(id.clone(), s.history);
            store.products.insert(id, (s.product, s.active));
        }
        Self {
            store: RwLock::new(store),
            retention_days,
        }
    }

    pub async fn add_product(&self, product: ProductRef, active: bool) {
        let mut store = self.store.write().await;
        store
            .products
            .insert(product.product_id.clone(), (product, active));
    }

    pub async fn add_history(&self, product_id: &str, records: Vec<RawRecord>) {
        let mut store = self.store.write().await;
        store
            .history
            .entry(product_id.to_string())
            .or_default()
            .extend(records);
    }

    pub async fn get_forecast(
        &self,
        product_id: &str,
        forecast_date: NaiveDate,
    ) -> Option<StoredForecast> {
        let store = self.store.read().await;
        store
            .forecasts
            .get(&(product_id.to_string(), forecast_date))
            .cloned()
    }

    pub async fn stored_forecasts(&self) -> Vec<StoredForecast> {
        self.store.read().await.forecasts.values().cloned().collect()
    }

    /// Drop forecasts that expired before `today`; returns how many.
    pub async fn purge_expired(&self, today: NaiveDate) -> usize {
        let mut store = self.store.write().await;
        let before = store.forecasts.len();
        store.forecasts.retain(|_, f| f.expires_at >= today);
        before - store.forecasts.len()
    }
}

#[async_trait]
impl ForecastRepository for InMemoryRepository {
    async fn fetch_active_products(&self) -> Result<Vec<ProductRef>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store
            .products
            .values()
            .filter(|(_, active)| *active)
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn fetch_historical_range(
        &self,
        product_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRecord>, RepositoryError> {
        let store = self.store.read().await;
        if !store.products.contains_key(product_id) {
            return Err(RepositoryError::NotFound(product_id.to_string()));
        }

        let records = store.history.get(product_id).map_or(&[][..], |v| &v[..]);
        // Records with unparsable dates are passed through so the core rejects them
        Ok(records
            .iter()
            .filter(|r| match r.date.as_deref().map(parse_date) {
                Some(Ok(d)) => d >= start && d <= end,
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn persist_forecast(
        &self,
        product_id: &str,
        result: &ForecastResult,
    ) -> Result<(), RepositoryError> {
        let forecast_date = result.forecast_date;
        let stored = StoredForecast {
            product_id: product_id.to_string(),
            forecast_date,
            expires_at: forecast_date + Duration::days(self.retention_days),
            result: result.clone(),
        };
        let mut store = self.store.write().await;
        store
            .forecasts
            .insert((product_id.to_string(), forecast_date), stored);
        Ok(())
    }
}
