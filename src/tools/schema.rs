//! JSON Schema fragments shared by the tool definitions.

use rmcp::model::JsonObject;
use serde_json::{Value, json};

/// An object schema with the given properties and required keys.
pub fn object(properties: Value, required: &[&str]) -> JsonObject {
    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), properties);
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    schema
}

pub fn property_id() -> Value {
    json!({
        "type": ["string", "number"],
        "description": "The Google Analytics property ID. Can be a number or 'properties/NUMBER' format.",
    })
}

pub fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

pub fn id(description: &str) -> Value {
    json!({ "type": ["string", "number"], "description": description })
}

pub fn choice(description: &str, options: &[&str]) -> Value {
    json!({ "type": "string", "enum": options, "description": description })
}

pub fn number(description: &str) -> Value {
    json!({ "type": "number", "description": description })
}

pub fn string_array(description: &str) -> Value {
    json!({ "type": "array", "description": description, "items": { "type": "string" } })
}

pub fn free_object(description: &str) -> Value {
    json!({ "type": "object", "description": description })
}

pub fn object_array(description: &str) -> Value {
    json!({ "type": "array", "description": description, "items": { "type": "object" } })
}

pub fn date_ranges() -> Value {
    json!({
        "type": "array",
        "description": "Array of date ranges to include in the report (at most 4)",
        "items": {
            "type": "object",
            "properties": {
                "start_date": {
                    "type": "string",
                    "description": "Start date in YYYY-MM-DD format or relative format like '7daysAgo', 'yesterday', 'today'",
                },
                "end_date": {
                    "type": "string",
                    "description": "End date in YYYY-MM-DD format or relative format like 'yesterday', 'today'",
                },
                "name": {
                    "type": "string",
                    "description": "Optional name for this date range",
                },
            },
            "required": ["start_date", "end_date"],
        },
    })
}

/// Schema for tools whose only argument is the property.
pub fn property_only() -> JsonObject {
    property_scoped(json!({}), &[])
}

/// `property_id` plus the given properties; `property_id` is always required.
pub fn property_scoped(properties: Value, required: &[&str]) -> JsonObject {
    let mut all = serde_json::Map::new();
    all.insert("property_id".to_string(), property_id());
    if let Value::Object(extra) = properties {
        all.extend(extra);
    }
    let mut keys = vec!["property_id"];
    keys.extend_from_slice(required);
    object(Value::Object(all), &keys)
}

/// Property-scoped schema for a child resource addressed by `id_key`.
pub fn child_scoped(id_key: &str, id_description: &str, extra: Value, required: &[&str]) -> JsonObject {
    let mut props = serde_json::Map::new();
    props.insert(id_key.to_string(), id(id_description));
    if let Value::Object(extra) = extra {
        props.extend(extra);
    }
    let mut keys = vec![id_key];
    keys.extend_from_slice(required);
    property_scoped(Value::Object(props), &keys)
}
