//! Request and response types of the JSON boundary.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error_handling::ServiceError;

/// Boundary actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Forecast,
    Recommendations,
}

impl FromStr for Action {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forecast" => Ok(Action::Forecast),
            "recommendations" => Ok(Action::Recommendations),
            other => Err(ServiceError::InvalidAction(other.to_string())),
        }
    }
}

/// Transport response: status, headers and a serialised JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Response {
    fn with_body(status_code: u16, body: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        Self {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    /// 200 response with `{"success": true, "data": data}`.
    pub fn success(data: Value) -> Self {
        Self::with_body(200, &json!({ "success": true, "data": data }))
    }

    /// Error response with `{"success": false, "error": message}`.
    pub fn failure(error: &ServiceError) -> Self {
        Self::with_body(
            error.status_code(),
            &json!({ "success": false, "error": error.to_string() }),
        )
    }

    /// Parsed body.
    pub fn body_json(&self) -> Result<Value, ServiceError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ServiceError::Internal(format!("response body is not JSON: {}", e)))
    }
}
