//! Error types for demand forecasting operations.

use thiserror::Error;

/// Result type for forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Error types for forecasting and recommendation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Invalid historical data: {0}")]
    InvalidData(String),

    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Invalid parameter '{param}' = '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },

    #[error("Model fit failed: {0}")]
    ModelFit(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ForecastError {
    /// Short machine-readable name of the variant, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::InvalidData(_) => "invalid_data",
            ForecastError::InsufficientData { .. } => "insufficient_data",
            ForecastError::InvalidDateFormat(_) => "invalid_date",
            ForecastError::InvalidParameter { .. } => "invalid_parameter",
            ForecastError::ModelFit(_) => "model_fit",
            ForecastError::InternalError(_) => "internal",
        }
    }

    /// Whether the error rejects the request's input rather than the computation.
    ///
    /// Data validation errors are reported straight back to the caller and
    /// never retried.
    pub fn is_data_validation(&self) -> bool {
        matches!(
            self,
            ForecastError::InvalidData(_)
                | ForecastError::InsufficientData { .. }
                | ForecastError::InvalidDateFormat(_)
                | ForecastError::InvalidParameter { .. }
        )
    }
}
