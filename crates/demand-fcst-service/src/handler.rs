//! Request dispatch for the `forecast` and `recommendations` actions.
//!
//! An event is either a gateway-style envelope whose `body` holds the
//! request (as a JSON string or object) or the request object itself.
//! Every outcome, including panics inside the core, becomes a [`Response`].

use std::time::Instant;

use chrono::{DateTime, Utc};
use demand_fcst_core::{
    generate_forecast, generate_recommendations, ForecastPolicy, RecommendationPolicy,
};
use serde_json::Value;
use tracing::Instrument;

use crate::conversion::{parse_forecast_request, parse_snapshots};
use crate::error_handling::{guarded, ServiceError};
use crate::types::{Action, Response};

/// Policies and clock shared by all requests.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub forecast_policy: ForecastPolicy,
    pub recommendation_policy: RecommendationPolicy,
    /// Source of "now"; injectable for tests
    pub clock: fn() -> DateTime<Utc>,
}

impl Default for HandlerContext {
    fn default() -> Self {
        Self {
            forecast_policy: ForecastPolicy::default(),
            recommendation_policy: RecommendationPolicy::default(),
            clock: Utc::now,
        }
    }
}

impl HandlerContext {
    pub fn new(forecast_policy: ForecastPolicy, recommendation_policy: RecommendationPolicy) -> Self {
        Self {
            forecast_policy,
            recommendation_policy,
            ..Default::default()
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }
}

/// Unwrap the request object from an event.
fn extract_request(event: &Value) -> Result<Value, ServiceError> {
    match event.get("body") {
        None => Ok(event.clone()),
        Some(Value::String(raw)) => serde_json::from_str(raw)
            .map_err(|e| ServiceError::MalformedRequest(format!("body is not valid JSON: {}", e))),
        Some(body @ Value::Object(_)) => Ok(body.clone()),
        Some(_) => Err(ServiceError::MalformedRequest(
            "body must be a JSON object or string".to_string(),
        )),
    }
}

fn parse_action(request: &Value) -> Result<Action, ServiceError> {
    match request.get("action") {
        None | Some(Value::Null) => Ok(Action::default()),
        Some(Value::String(s)) => s.parse(),
        Some(other) => Err(ServiceError::InvalidAction(other.to_string())),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(value)
        .map_err(|e| ServiceError::Internal(format!("failed to serialise response: {}", e)))
}

/// Handle an unwrapped request object and return the response `data`.
pub fn handle_request(request: &Value, ctx: &HandlerContext) -> Result<Value, ServiceError> {
    if !request.is_object() {
        return Err(ServiceError::MalformedRequest(
            "request must be a JSON object".to_string(),
        ));
    }

    match parse_action(request)? {
        Action::Forecast => {
            let empty = Value::Object(Default::default());
            let data = request.get("data").unwrap_or(&empty);
            let forecast_request = parse_forecast_request(data)?;
            let today = (ctx.clock)().date_naive();
            let result = generate_forecast(&forecast_request, today, &ctx.forecast_policy)?;
            tracing::info!(
                product_id = %result.product_id,
                trend = result.trend.as_str(),
                seasonality = result.seasonality.as_str(),
                accuracy = result.accuracy,
                accuracy_measured = result.accuracy_measured,
                "forecast generated"
            );
            to_json(&result)
        }
        Action::Recommendations => {
            let snapshots = parse_snapshots(request.get("products_data"))?;
            let recommendations =
                generate_recommendations(&snapshots, (ctx.clock)(), &ctx.recommendation_policy);
            tracing::info!(
                products = snapshots.len(),
                recommendations = recommendations.len(),
                "recommendations generated"
            );
            to_json(&recommendations)
        }
    }
}

/// Handle a transport event.
pub fn handle_event(event: &Value, ctx: &HandlerContext) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("request", %request_id);
    let _entered = span.enter();
    let started = Instant::now();

    let outcome = guarded(|| {
        let request = extract_request(event)?;
        handle_request(&request, ctx)
    });

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(data) => {
            tracing::debug!(elapsed_ms, "request succeeded");
            Response::success(data)
        }
        Err(err) => {
            if err.is_client_error() {
                tracing::warn!(error = %err, kind = err.kind(), elapsed_ms, "request rejected");
            } else {
                tracing::error!(error = %err, kind = err.kind(), elapsed_ms, "request failed");
            }
            Response::failure(&err)
        }
    }
}

/// Handle an event given as raw JSON text.
pub fn handle_raw(input: &str, ctx: &HandlerContext) -> Response {
    match serde_json::from_str::<Value>(input) {
        Ok(event) => handle_event(&event, ctx),
        Err(e) => Response::failure(&ServiceError::MalformedRequest(format!(
            "event is not valid JSON: {}",
            e
        ))),
    }
}

/// Handle an event on the blocking pool so a long fit does not stall the runtime.
pub async fn handle_event_async(event: Value, ctx: HandlerContext) -> Response {
    let span = tracing::Span::current();
    match tokio::task::spawn_blocking(move || handle_event(&event, &ctx))
        .instrument(span)
        .await
    {
        Ok(response) => response,
        Err(e) => Response::failure(&ServiceError::Internal(format!(
            "request task failed: {}",
            e
        ))),
    }
}
