//! Service boundary for the demand forecasting core.
//!
//! This crate answers JSON requests (`forecast`, `recommendations`), owns
//! the repository seam used by the batch driver, and loads configuration.
//! All computation is delegated to `demand_fcst_core`.

pub mod batch;
pub mod config;
pub mod conversion;
pub mod error_handling;
pub mod handler;
pub mod repository;
pub mod types;

pub use batch::{BatchDriver, BatchSummary, ProductFailure};
pub use config::{init_tracing, BatchConfig, ConfigLoadError, LoggingConfig, ServiceConfig};
pub use error_handling::ServiceError;
pub use handler::{handle_event, handle_event_async, handle_raw, handle_request, HandlerContext};
pub use repository::{
    ForecastRepository, InMemoryRepository, ProductRef, RepositoryError, SeedProduct,
    StoredForecast,
};
pub use types::{Action, Response};
