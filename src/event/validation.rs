use super::LocationUpdate;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// Validation errors for upstream location payloads
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    PayloadNotObject,
    MissingEntityId,
    MissingCoordinate(&'static str),
    InvalidCoordinate { field: &'static str, value: String },
    InvalidTimestamp(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::PayloadNotObject => write!(f, "payload must be a JSON object"),
            ValidationError::MissingEntityId => write!(f, "entity_id is required"),
            ValidationError::MissingCoordinate(field) => write!(f, "{} is required", field),
            ValidationError::InvalidCoordinate { field, value } => {
                write!(f, "invalid {} '{}'", field, value)
            }
            ValidationError::InvalidTimestamp(ts) => {
                write!(f, "observed_at must be RFC 3339 or epoch milliseconds, got {}", ts)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Parses an upstream payload into a LocationUpdate.
///
/// Rules:
/// - Payload: JSON object, optionally wrapped in `new` or `record`
/// - entity_id (alias driver_id): non-empty string or integer
/// - latitude (alias lat): number or numeric string in [-90, 90]
/// - longitude (aliases lng, lon): number or numeric string in [-180, 180]
/// - observed_at (alias updated_at): optional RFC 3339 string or epoch millis
/// - display_name, active_task_id: optional strings, null treated as absent
pub fn parse_payload(payload: &Value) -> Result<LocationUpdate, ValidationError> {
    let record = unwrap_envelope(payload)?;

    let entity_id = entity_id(record)?;
    let latitude = coordinate(record, "latitude", &["latitude", "lat"], 90.0)?;
    let longitude = coordinate(record, "longitude", &["longitude", "lng", "lon"], 180.0)?;
    let observed_at = observed_at(record)?;

    Ok(LocationUpdate {
        entity_id,
        latitude,
        longitude,
        observed_at,
        display_name: optional_string(record, &["display_name", "driver_name"]),
        active_task_id: optional_string(record, &["active_task_id", "current_task_id"]),
    })
}

fn unwrap_envelope(payload: &Value) -> Result<&Map<String, Value>, ValidationError> {
    let object = payload.as_object().ok_or(ValidationError::PayloadNotObject)?;

    for key in ["new", "record"] {
        if let Some(inner) = object.get(key) {
            return inner.as_object().ok_or(ValidationError::PayloadNotObject);
        }
    }

    Ok(object)
}

fn first<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

fn entity_id(record: &Map<String, Value>) -> Result<String, ValidationError> {
    match first(record, &["entity_id", "driver_id"]) {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        _ => Err(ValidationError::MissingEntityId),
    }
}

fn coordinate(
    record: &Map<String, Value>,
    field: &'static str,
    keys: &[&str],
    limit: f64,
) -> Result<f64, ValidationError> {
    let raw = first(record, keys).ok_or(ValidationError::MissingCoordinate(field))?;

    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match value {
        Some(v) if v.is_finite() && v.abs() <= limit => Ok(v),
        _ => Err(ValidationError::InvalidCoordinate {
            field,
            value: raw.to_string(),
        }),
    }
}

fn observed_at(record: &Map<String, Value>) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let raw = match first(record, &["observed_at", "updated_at"]) {
        Some(raw) => raw,
        None => return Ok(None),
    };

    let parsed = match raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    };

    parsed
        .map(Some)
        .ok_or_else(|| ValidationError::InvalidTimestamp(raw.to_string()))
}

fn optional_string(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match first(record, keys)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
