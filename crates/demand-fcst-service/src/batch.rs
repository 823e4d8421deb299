//! Batch forecasting over every active product.
//!
//! Products are processed concurrently up to `max_concurrency`. Each one
//! (fetch history, fit, persist) runs under its own wall-clock timeout, and
//! its failure is recorded in the summary instead of aborting the run.
//! Model fitting runs on the blocking pool; a timed-out fit is abandoned,
//! not cancelled.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as Days, NaiveDate};
use demand_fcst_core::{generate_forecast, ForecastPolicy, ForecastRequest};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::config::BatchConfig;
use crate::repository::{ForecastRepository, ProductRef, RepositoryError};

/// A product that did not produce a persisted forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFailure {
    pub product_id: String,
    pub reason: String,
    pub timed_out: bool,
}

/// Outcome counts of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub total: usize,
    pub succeeded: usize,
    /// Failures other than timeouts
    pub failed: usize,
    pub timed_out: usize,
    pub failures: Vec<ProductFailure>,
}

enum Outcome {
    Succeeded,
    Failed(String),
    TimedOut,
}

pub struct BatchDriver {
    repository: Arc<dyn ForecastRepository>,
    policy: ForecastPolicy,
    config: BatchConfig,
    product_timeout: Duration,
}

impl BatchDriver {
    pub fn new(
        repository: Arc<dyn ForecastRepository>,
        policy: ForecastPolicy,
        config: BatchConfig,
    ) -> Self {
        let product_timeout = Duration::from_secs(config.product_timeout_secs);
        Self {
            repository,
            policy,
            config,
            product_timeout,
        }
    }

    /// Override the per-product timeout.
    pub fn with_product_timeout(mut self, timeout: Duration) -> Self {
        self.product_timeout = timeout;
        self
    }

    /// Forecast one product and persist the result.
    async fn process_product(&self, product: &ProductRef, today: NaiveDate) -> Result<(), String> {
        let start = today - Days::days(self.config.history_days);
        let history = self
            .repository
            .fetch_historical_range(&product.product_id, start, today)
            .await
            .map_err(|e| e.to_string())?;

        let mut request =
            ForecastRequest::new(&product.product_id, &product.product_name, history);
        request.fallback_price = product.unit_price;

        let policy = self.policy.clone();
        let result = tokio::task::spawn_blocking(move || generate_forecast(&request, today, &policy))
            .await
            .map_err(|e| format!("forecast task failed: {}", e))?
            .map_err(|e| e.to_string())?;

        self.repository
            .persist_forecast(&product.product_id, &result)
            .await
            .map_err(|e| e.to_string())
    }

    /// Forecast all active products as of `today`.
    ///
    /// # Errors
    /// Only when the product list itself cannot be fetched.
    pub async fn run(&self, today: NaiveDate) -> Result<BatchSummary, RepositoryError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let products = self.repository.fetch_active_products().await?;
        let total = products.len();
        tracing::info!(%run_id, products = total, %today, "batch run started");

        let outcomes: Vec<(String, Outcome)> = stream::iter(products)
            .map(|product| {
                let span = tracing::info_span!("product", product_id = %product.product_id);
                async move {
                    let outcome = match tokio::time::timeout(
                        self.product_timeout,
                        self.process_product(&product, today),
                    )
                    .await
                    {
                        Ok(Ok(())) => Outcome::Succeeded,
                        Ok(Err(reason)) => {
                            tracing::error!(%reason, "product forecast failed");
                            Outcome::Failed(reason)
                        }
                        Err(_) => {
                            tracing::error!(
                                timeout_ms = self.product_timeout.as_millis() as u64,
                                "product forecast timed out"
                            );
                            Outcome::TimedOut
                        }
                    };
                    (product.product_id, outcome)
                }
                .instrument(span)
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut summary = BatchSummary {
            run_id,
            total,
            succeeded: 0,
            failed: 0,
            timed_out: 0,
            failures: Vec::new(),
        };
        for (product_id, outcome) in outcomes {
            match outcome {
                Outcome::Succeeded => summary.succeeded += 1,
                Outcome::Failed(reason) => {
                    summary.failed += 1;
                    summary.failures.push(ProductFailure {
                        product_id,
                        reason,
                        timed_out: false,
                    });
                }
                Outcome::TimedOut => {
                    summary.timed_out += 1;
                    summary.failures.push(ProductFailure {
                        product_id,
                        reason: format!("timed out after {:?}", self.product_timeout),
                        timed_out: true,
                    });
                }
            }
        }
        summary
            .failures
            .sort_by(|a, b| a.product_id.cmp(&b.product_id));

        tracing::info!(
            run_id = %summary.run_id,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            timed_out = summary.timed_out,
            "batch run finished"
        );
        Ok(summary)
    }
}
