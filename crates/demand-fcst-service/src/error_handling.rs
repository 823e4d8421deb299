//! Error type of the request boundary and panic isolation.
//!
//! Every failure leaving the boundary is a [`ServiceError`]; its
//! [`status_code`](ServiceError::status_code) decides whether the caller
//! sees a client error (400) or a server error (500).

use std::panic::{catch_unwind, AssertUnwindSafe};

use demand_fcst_core::ForecastError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Invalid action: {0}. Supported actions: forecast, recommendations")]
    InvalidAction(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP-style status for the error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::InvalidAction(_) | ServiceError::MalformedRequest(_) => 400,
            ServiceError::Forecast(e) if e.is_data_validation() => 400,
            ServiceError::Forecast(_) | ServiceError::Internal(_) => 500,
        }
    }

    /// Short name of the error for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidAction(_) => "invalid_action",
            ServiceError::MalformedRequest(_) => "malformed_request",
            ServiceError::Forecast(e) => e.kind(),
            ServiceError::Internal(_) => "internal",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Run `f`, turning a panic into [`ServiceError::Internal`].
pub fn guarded<F, T>(f: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(%message, "panic while handling request");
            Err(ServiceError::Internal(format!("panic: {}", message)))
        }
    }
}
