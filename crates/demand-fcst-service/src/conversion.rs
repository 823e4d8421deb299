//! Lenient conversion from JSON payloads to core request types.
//!
//! Callers send numbers as JSON numbers or numeric strings, and flags as
//! booleans, 0/1, or "true"/"false". Absent optional fields fall back to
//! the core defaults; present fields of the wrong shape are rejected.

use demand_fcst_core::{ForecastError, ForecastRequest, InventorySnapshot, RawRecord};
use serde_json::{Map, Value};

use crate::error_handling::ServiceError;

/// Convert a JSON number or numeric string to `f64`.
#[inline]
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Convert a JSON boolean, number, or boolean-like string to `bool`.
#[inline]
pub fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Convert a JSON string or number to an identifier string.
#[inline]
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ServiceError> {
    value
        .as_object()
        .ok_or_else(|| ServiceError::MalformedRequest(format!("{} must be a JSON object", what)))
}

/// Field that is absent or JSON null.
fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn optional_f64(obj: &Map<String, Value>, key: &str) -> Result<Option<f64>, ServiceError> {
    match field(obj, key) {
        None => Ok(None),
        Some(v) => value_to_f64(v).map(Some).ok_or_else(|| {
            ServiceError::Forecast(ForecastError::InvalidParameter {
                param: key.to_string(),
                value: v.to_string(),
                reason: "must be a number".to_string(),
            })
        }),
    }
}

fn required_id(obj: &Map<String, Value>, key: &str) -> Result<String, ServiceError> {
    field(obj, key)
        .and_then(value_to_string)
        .ok_or_else(|| ServiceError::MalformedRequest(format!("'{}' is required", key)))
}

/// Convert one historical record.
pub fn parse_record(index: usize, value: &Value) -> Result<RawRecord, ServiceError> {
    let obj = as_object(value, &format!("historical_data[{}]", index))?;

    let date = field(obj, "date").map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    let demand = match field(obj, "demand") {
        None => None,
        Some(v) => Some(value_to_f64(v).ok_or_else(|| {
            ServiceError::Forecast(ForecastError::InvalidData(format!(
                "record {} has non-numeric demand {}",
                index, v
            )))
        })?),
    };

    let price = match field(obj, "price") {
        None => None,
        Some(v) => Some(value_to_f64(v).ok_or_else(|| {
            ServiceError::Forecast(ForecastError::InvalidData(format!(
                "record {} has non-numeric price {}",
                index, v
            )))
        })?),
    };

    let promotion = match field(obj, "promotion") {
        None => None,
        Some(v) => Some(value_to_bool(v).ok_or_else(|| {
            ServiceError::Forecast(ForecastError::InvalidData(format!(
                "record {} has invalid promotion flag {}",
                index, v
            )))
        })?),
    };

    Ok(RawRecord {
        date,
        demand,
        price,
        promotion,
    })
}

/// Convert the `data` object of a forecast action.
pub fn parse_forecast_request(data: &Value) -> Result<ForecastRequest, ServiceError> {
    let obj = as_object(data, "data")?;

    let product_id = required_id(obj, "product_id")?;
    let product_name = field(obj, "product_name")
        .and_then(value_to_string)
        .unwrap_or_default();

    let historical_data = match field(obj, "historical_data") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| parse_record(i, v))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(ServiceError::MalformedRequest(
                "'historical_data' must be an array".to_string(),
            ))
        }
    };

    let mut request = ForecastRequest::new(product_id, product_name, historical_data);

    if let Some(days) = optional_f64(obj, "forecast_days")? {
        if days < 0.0 || days.fract() != 0.0 {
            return Err(ServiceError::Forecast(ForecastError::InvalidParameter {
                param: "forecast_days".to_string(),
                value: days.to_string(),
                reason: "must be a positive integer".to_string(),
            }));
        }
        request.forecast_days = days as usize;
    }
    if let Some(width) = optional_f64(obj, "confidence_interval")? {
        request.confidence_interval = width;
    }
    request.fallback_price = optional_f64(obj, "unit_price")?;

    Ok(request)
}

/// Convert one inventory snapshot, applying the snapshot defaults.
pub fn parse_snapshot(index: usize, value: &Value) -> Result<InventorySnapshot, ServiceError> {
    let obj = as_object(value, &format!("products_data[{}]", index))?;

    let mut snapshot = InventorySnapshot::new(required_id(obj, "product_id")?, 0.0);
    snapshot.product_name = field(obj, "product_name")
        .and_then(value_to_string)
        .unwrap_or_default();
    snapshot.sku = field(obj, "sku")
        .or_else(|| field(obj, "product_sku"))
        .and_then(value_to_string)
        .unwrap_or_default();

    if let Some(v) = optional_f64(obj, "current_stock")? {
        snapshot.current_stock = v;
    }
    if let Some(v) = optional_f64(obj, "min_threshold")? {
        snapshot.min_threshold = v;
    }
    if let Some(v) = optional_f64(obj, "avg_daily_demand")? {
        snapshot.avg_daily_demand = v;
    }
    if let Some(v) = optional_f64(obj, "last_order_days_ago")? {
        snapshot.last_order_days_ago = v;
    }
    let price = match optional_f64(obj, "unit_price")? {
        Some(p) => Some(p),
        None => optional_f64(obj, "price")?,
    };
    if let Some(p) = price {
        snapshot.unit_price = p;
    }

    Ok(snapshot)
}

/// Convert the `products_data` array of a recommendations action.
///
/// A missing array is an empty batch.
pub fn parse_snapshots(products: Option<&Value>) -> Result<Vec<InventorySnapshot>, ServiceError> {
    match products {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| parse_snapshot(i, v))
            .collect(),
        Some(_) => Err(ServiceError::MalformedRequest(
            "'products_data' must be an array".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_to_f64() {
        assert_eq!(value_to_f64(&json!(5)), Some(5.0));
        assert_eq!(value_to_f64(&json!(2.5)), Some(2.5));
        assert_eq!(value_to_f64(&json!(" 7.25 ")), Some(7.25));
        assert_eq!(value_to_f64(&json!("abc")), None);
        assert_eq!(value_to_f64(&json!(true)), None);
    }

    #[test]
    fn test_value_to_bool() {
        assert_eq!(value_to_bool(&json!(true)), Some(true));
        assert_eq!(value_to_bool(&json!(0)), Some(false));
        assert_eq!(value_to_bool(&json!(1)), Some(true));
        assert_eq!(value_to_bool(&json!("False")), Some(false));
        assert_eq!(value_to_bool(&json!("maybe")), None);
    }

    #[test]
    fn test_parse_record_lenient() {
        let record = parse_record(
            0,
            &json!({"date": "2025-01-02", "demand": "12", "price": 3, "promotion": 1}),
        )
        .unwrap();
        assert_eq!(record.date.as_deref(), Some("2025-01-02"));
        assert_eq!(record.demand, Some(12.0));
        assert_eq!(record.price, Some(3.0));
        assert_eq!(record.promotion, Some(true));
    }

    #[test]
    fn test_parse_record_missing_fields_left_to_core() {
        let record = parse_record(3, &json!({"demand": 4})).unwrap();
        assert_eq!(record.date, None);
        let err = parse_record(3, &json!({"date": "2025-01-02", "demand": "lots"})).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(parse_record(0, &json!([1, 2])).is_err());
    }

    #[test]
    fn test_parse_forecast_request() {
        let data = json!({
            "product_id": 42,
            "product_name": "Widget",
            "historical_data": [{"date": "2025-01-01", "demand": 3}],
            "forecast_days": "14",
            "confidence_interval": 0.8,
            "unit_price": 9.5
        });
        let request = parse_forecast_request(&data).unwrap();
        assert_eq!(request.product_id, "42");
        assert_eq!(request.forecast_days, 14);
        assert_eq!(request.confidence_interval, 0.8);
        assert_eq!(request.fallback_price, Some(9.5));
        assert_eq!(request.historical_data.len(), 1);
    }

    #[test]
    fn test_parse_forecast_request_defaults_and_errors() {
        let request = parse_forecast_request(&json!({"product_id": "p"})).unwrap();
        assert_eq!(request.forecast_days, 30);
        assert_eq!(request.confidence_interval, 0.95);
        assert!(request.historical_data.is_empty());

        assert!(matches!(
            parse_forecast_request(&json!({"product_name": "x"})),
            Err(ServiceError::MalformedRequest(_))
        ));
        assert!(matches!(
            parse_forecast_request(&json!({"product_id": "p", "forecast_days": 2.5})),
            Err(ServiceError::Forecast(ForecastError::InvalidParameter { .. }))
        ));
        assert!(matches!(
            parse_forecast_request(&json!({"product_id": "p", "historical_data": {}})),
            Err(ServiceError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_parse_snapshot_defaults_and_aliases() {
        let s = parse_snapshot(
            0,
            &json!({"product_id": "p1", "product_sku": "SKU-1", "price": "4", "current_stock": 3}),
        )
        .unwrap();
        assert_eq!(s.sku, "SKU-1");
        assert_eq!(s.unit_price, 4.0);
        assert_eq!(s.current_stock, 3.0);
        assert_eq!(s.min_threshold, 10.0);
        assert_eq!(s.avg_daily_demand, 1.0);
        assert_eq!(s.last_order_days_ago, 30.0);
    }

    #[test]
    fn test_parse_snapshots() {
        assert!(parse_snapshots(None).unwrap().is_empty());
        let list = parse_snapshots(Some(&json!([{"product_id": "a"}, {"product_id": "b"}])))
            .unwrap();
        assert_eq!(list.len(), 2);
        assert!(parse_snapshots(Some(&json!("nope"))).is_err());
        assert!(parse_snapshots(Some(&json!([{"current_stock": 1}]))).is_err());
    }
}
