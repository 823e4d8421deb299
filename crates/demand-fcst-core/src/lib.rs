//! Core library for demand forecasting and inventory recommendations.
//!
//! This crate holds the computation only: series preparation, pattern
//! detection, model fitting, accuracy estimation, forecast synthesis and
//! the recommendation rules. It performs no I/O.

pub mod accuracy;
pub mod error;
pub mod forecast;
pub mod metrics;
pub mod model;
pub mod patterns;
pub mod policy;
pub mod recommend;
pub mod series;
pub mod stats;

// Re-exports for convenience
pub use accuracy::{estimate_accuracy, AccuracyEstimate};
pub use error::{ForecastError, Result};
pub use forecast::{
    generate_forecast, synthesize, ConfidenceMetrics, ForecastPoint, ForecastRequest,
    ForecastResult, DEFAULT_CONFIDENCE_INTERVAL, DEFAULT_FORECAST_DAYS,
};
pub use metrics::{accuracy_percentage, bias, coverage, mae, mse, rmse};
pub use model::{
    fit_model, fit_with_fallback, FittedModel, ModelConfig, ModelFit, ModelForecast,
    SeasonalityMode,
};
pub use patterns::{
    analyze_patterns, detect_patterns, PatternAnalysis, PatternClassification, Seasonality, Trend,
};
pub use policy::{ForecastPolicy, RecommendationPolicy, SeasonalityStrengths};
pub use recommend::{
    generate_recommendations, recommend_for, InventorySnapshot, Priority, Recommendation,
    RecommendationType,
};
pub use series::{parse_date, prepare_series, Covariate, HistoricalRecord, PreparedSeries, RawRecord};
