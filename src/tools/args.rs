//! Argument extraction for tool handlers.
//!
//! Arguments arrive as a loosely typed JSON object. These helpers pull typed
//! values out of it and turn anything missing or ill-typed into a
//! `ValidationError` the caller can act on.

use std::fmt;

use chrono::NaiveDate;
use rmcp::model::JsonObject;
use serde_json::{Value, json};

use super::envelope::ErrorPayload;
use crate::analytics::ApiError;

/// Upper bounds enforced before calling the Data API.
pub const MAX_DIMENSIONS: usize = 9;
pub const MAX_METRICS: usize = 10;
pub const MAX_DATE_RANGES: usize = 4;
pub const MAX_BATCH_REQUESTS: usize = 50;

/// Failure inside a tool handler.
#[derive(Debug)]
pub enum ToolError {
    /// An argument failed a precondition; carries the finished payload.
    Validation(ErrorPayload),
    /// The upstream call failed.
    Api(ApiError),
    /// A handler-level precondition failed after talking to the API.
    Failed(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(payload) => write!(f, "{}", payload.message),
            Self::Api(e) => write!(f, "{}", e),
            Self::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<ApiError> for ToolError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

impl From<ErrorPayload> for ToolError {
    fn from(payload: ErrorPayload) -> Self {
        Self::Validation(payload)
    }
}

pub type ToolOutcome = Result<Value, ToolError>;

const PROPERTY_ID_EXPECTED: &str =
    "Expected a property ID as a number or a string like '123456' or 'properties/123456'";

/// Normalize a property identifier to `properties/<ID>`.
///
/// Accepts a JSON number, a bare numeric string, or an already prefixed
/// string. Returns `None` for anything else.
pub fn normalize_property_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_u64().map(|id| format!("properties/{}", id)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s == "properties/" {
                None
            } else if s.starts_with("properties/") {
                Some(s.to_string())
            } else {
                Some(format!("properties/{}", s))
            }
        }
        _ => None,
    }
}

/// Required `property_id`, normalized.
pub fn property_name(args: &JsonObject) -> Result<String, ToolError> {
    let value = args.get("property_id").unwrap_or(&Value::Null);
    normalize_property_id(value).ok_or_else(|| {
        ErrorPayload::validation("property_id", value.clone(), PROPERTY_ID_EXPECTED).into()
    })
}

fn missing(key: &str, expected: &str) -> ToolError {
    ErrorPayload::validation(key, Value::Null, format!("'{}' is required. {}", key, expected))
        .into()
}

fn wrong_type(key: &str, value: &Value, expected: &str) -> ToolError {
    ErrorPayload::validation(key, value.clone(), expected).into()
}

/// A value that is present and not null.
pub fn optional_value<'a>(args: &'a JsonObject, key: &str) -> Option<&'a Value> {
    args.get(key).filter(|v| !v.is_null())
}

pub fn required_str<'a>(args: &'a JsonObject, key: &str) -> Result<&'a str, ToolError> {
    match optional_value(args, key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(other) => Err(wrong_type(key, other, "Expected a non-empty string")),
        None => Err(missing(key, "Expected a non-empty string")),
    }
}

pub fn optional_str<'a>(args: &'a JsonObject, key: &str) -> Result<Option<&'a str>, ToolError> {
    match optional_value(args, key) {
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(wrong_type(key, other, "Expected a string")),
        None => Ok(None),
    }
}

/// A child resource id; numbers are accepted and rendered as-is.
pub fn required_id(args: &JsonObject, key: &str) -> Result<String, ToolError> {
    match optional_value(args, key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(wrong_type(key, other, "Expected an ID as a string or number")),
        None => Err(missing(key, "Expected an ID as a string or number")),
    }
}

pub fn optional_u64(args: &JsonObject, key: &str) -> Result<Option<u64>, ToolError> {
    match optional_value(args, key) {
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| wrong_type(key, value, "Expected a non-negative integer")),
        None => Ok(None),
    }
}

/// Optional list of strings; missing means empty.
pub fn string_list(args: &JsonObject, key: &str) -> Result<Vec<String>, ToolError> {
    let Some(value) = optional_value(args, key) else {
        return Ok(Vec::new());
    };
    let expected = "Expected an array of strings";
    let items = value
        .as_array()
        .ok_or_else(|| wrong_type(key, value, expected))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| wrong_type(key, value, expected))
        })
        .collect()
}

pub fn required_string_list(args: &JsonObject, key: &str) -> Result<Vec<String>, ToolError> {
    let list = string_list(args, key)?;
    if list.is_empty() {
        return Err(missing(key, "Expected a non-empty array of strings"));
    }
    Ok(list)
}

/// A string argument restricted to a fixed set of values.
pub fn optional_choice(
    args: &JsonObject,
    key: &str,
    options: &[&str],
) -> Result<Option<String>, ToolError> {
    let Some(value) = optional_str(args, key)? else {
        return Ok(None);
    };
    if options.contains(&value) {
        return Ok(Some(value.to_string()));
    }
    Err(ErrorPayload::validation(
        key,
        json!(value),
        format!("Expected one of {}", options.join(", ")),
    )
    .with_valid_options(options.iter().copied())
    .into())
}

pub fn required_choice(args: &JsonObject, key: &str, options: &[&str]) -> Result<String, ToolError> {
    optional_choice(args, key, options)?.ok_or_else(|| {
        ErrorPayload::validation(
            key,
            Value::Null,
            format!("'{}' is required. Expected one of {}", key, options.join(", ")),
        )
        .with_valid_options(options.iter().copied())
        .into()
    })
}

/// Reject lists longer than the API allows.
pub fn check_max(key: &str, count: usize, max: usize) -> Result<(), ToolError> {
    if count <= max {
        return Ok(());
    }
    Err(ErrorPayload::validation(
        key,
        json!(count),
        format!("At most {} {} are allowed per request", max, key),
    )
    .with_valid_range(1, max as u64)
    .into())
}

/// Accepts `YYYY-MM-DD`, `today`, `yesterday` and `NdaysAgo`.
pub fn is_valid_date(date: &str) -> bool {
    if date == "today" || date == "yesterday" {
        return true;
    }
    if let Some(days) = date.strip_suffix("daysAgo") {
        return !days.is_empty() && days.bytes().all(|b| b.is_ascii_digit());
    }
    let shaped = date.len() == 10
        && date.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    shaped && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

const DATE_EXPECTED: &str = "Expected YYYY-MM-DD, 'today', 'yesterday' or 'NdaysAgo'";

/// Convert `date_ranges` into the Data API's `dateRanges`.
pub fn date_ranges(value: Option<&Value>, key: &str) -> Result<Vec<Value>, ToolError> {
    let expected = "Expected an array of {start_date, end_date, name?} objects";
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Err(missing(key, expected));
    };
    let ranges = value
        .as_array()
        .filter(|ranges| !ranges.is_empty())
        .ok_or_else(|| wrong_type(key, value, expected))?;
    check_max(key, ranges.len(), MAX_DATE_RANGES)?;

    ranges
        .iter()
        .map(|range| {
            let range = range
                .as_object()
                .ok_or_else(|| wrong_type(key, range, expected))?;
            let start = date_field(range, "start_date")?;
            let end = date_field(range, "end_date")?;

            let mut out = serde_json::Map::new();
            out.insert("startDate".to_string(), json!(start));
            out.insert("endDate".to_string(), json!(end));
            if let Some(name) = optional_str(range, "name")? {
                out.insert("name".to_string(), json!(name));
            }
            Ok(Value::Object(out))
        })
        .collect()
}

fn date_field<'a>(range: &'a JsonObject, key: &str) -> Result<&'a str, ToolError> {
    let date = required_str(range, key)?;
    if is_valid_date(date) {
        Ok(date)
    } else {
        Err(ErrorPayload::validation(key, json!(date), DATE_EXPECTED)
            .with_suggestion("Use dates like '2024-01-31', '30daysAgo', 'yesterday' or 'today'")
            .into())
    }
}

/// `["a", "b"]` to `[{"name": "a"}, {"name": "b"}]`.
pub fn named(names: &[String]) -> Value {
    Value::Array(names.iter().map(|name| json!({ "name": name })).collect())
}
