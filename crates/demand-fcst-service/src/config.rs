//! Layered service configuration and logging setup.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults (`ServiceConfig::default()`)
//! 2. An optional TOML/JSON/YAML file
//! 3. Environment variables `DEMAND_FCST__<SECTION>__<KEY>`
//!    (e.g. `DEMAND_FCST__BATCH__MAX_CONCURRENCY=8`)

use std::env;
use std::path::Path;

use config::{Config, Environment, File};
use demand_fcst_core::{ForecastPolicy, RecommendationPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "DEMAND_FCST";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Batch driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Products forecast concurrently
    pub max_concurrency: usize,
    /// Wall-clock bound per product
    pub product_timeout_secs: u64,
    /// Days of history fetched per product
    pub history_days: i64,
    /// Days a persisted forecast is kept
    pub retention_days: i64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            product_timeout_secs: 60,
            history_days: 90,
            retention_days: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub forecast: ForecastPolicy,
    pub recommendations: RecommendationPolicy,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load the layered configuration.
    ///
    /// A given `path` must exist; without one only defaults and the
    /// environment apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let mut builder = Config::builder().add_source(Config::try_from(&ServiceConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let service_config: ServiceConfig = config.try_deserialize()?;
        service_config.validate()?;
        Ok(service_config)
    }

    /// Reject settings the driver cannot run with.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.batch.max_concurrency == 0 {
            return Err(ConfigLoadError::Invalid(
                "batch.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.batch.product_timeout_secs == 0 {
            return Err(ConfigLoadError::Invalid(
                "batch.product_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.batch.history_days <= 0 || self.batch.retention_days <= 0 {
            return Err(ConfigLoadError::Invalid(
                "batch.history_days and batch.retention_days must be positive".to_string(),
            ));
        }
        let fraction = self.forecast.holdout_train_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigLoadError::Invalid(
                "forecast.holdout_train_fraction must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins over `level` when set. Calling this twice is harmless.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("demand_fcst_core={0},demand_fcst_service={0}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .with_writer(std::io::stderr)
            .try_init();
    }
}
