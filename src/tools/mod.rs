//! Tool handler registry and the Google Analytics tool catalog.
//!
//! Each submodule contributes one group of tools. `register_all` wires every
//! group to a shared backend in a fixed order, which is also the order
//! `list_tools` reports.

mod registry;

pub use registry::{ToolFuture, ToolHandler, ToolRegistry};

mod analytics_tool;
mod args;
mod envelope;
mod resource;
mod schema;
#[cfg(test)]
mod test_support;

pub use analytics_tool::AnalyticsTool;
pub use args::{ToolError, ToolOutcome, normalize_property_id};
pub use envelope::ErrorPayload;

// Tool groups
mod admin;
mod advanced_reporting;
mod audiences;
mod conversion_events;
mod custom_definitions;
mod data_filters;
mod data_streams;
mod integrations;
mod key_events;
mod metadata;
mod reports;

use std::sync::Arc;

use crate::analytics::AnalyticsBackend;

/// Build a registry holding every Analytics tool.
pub fn register_all(backend: Arc<dyn AnalyticsBackend>) -> ToolRegistry {
    let groups = [
        reports::tools(&backend),
        advanced_reporting::tools(&backend),
        metadata::tools(&backend),
        admin::tools(&backend),
        data_streams::tools(&backend),
        custom_definitions::tools(&backend),
        key_events::tools(&backend),
        conversion_events::tools(&backend),
        audiences::tools(&backend),
        data_filters::tools(&backend),
        integrations::tools(&backend),
    ];

    groups
        .into_iter()
        .flatten()
        .fold(ToolRegistry::new(), |registry, tool| registry.register_handler(tool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Api;
    use crate::tools::envelope::result_text;
    use crate::tools::test_support::RecordingBackend;
    use reqwest::Method;
    use rmcp::model::JsonObject;
    use serde_json::{Value, json};
    use std::collections::HashSet;

    fn registry_with(recorder: RecordingBackend) -> (Arc<RecordingBackend>, ToolRegistry) {
        let recorder = Arc::new(recorder);
        let backend: Arc<dyn AnalyticsBackend> = recorder.clone();
        (recorder, register_all(backend))
    }

    fn args(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    fn payload(result: &rmcp::model::CallToolResult) -> Value {
        serde_json::from_str(result_text(result).unwrap()).unwrap()
    }

    #[test]
    fn test_catalog_is_complete_and_unique() {
        let (_, registry) = registry_with(RecordingBackend::new());
        let names = registry.list_names();

        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(names.len(), 49);
        assert_eq!(names[0], "run_report");
        assert_eq!(names.last().map(String::as_str), Some("get_adsense_link"));
    }

    #[test]
    fn test_every_descriptor_is_filled_in() {
        let (_, registry) = registry_with(RecordingBackend::new());
        for tool in registry.list_tools() {
            assert!(!tool.name.is_empty());
            assert!(
                tool.description.as_deref().is_some_and(|d| !d.is_empty()),
                "{} has no description",
                tool.name
            );
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
        }
    }

    #[test]
    fn test_property_scoped_tools_require_property_id() {
        let (_, registry) = registry_with(RecordingBackend::new());
        let unscoped = ["get_account_summaries", "list_accounts", "list_properties"];
        for tool in registry.list_tools() {
            if unscoped.iter().any(|name| *name == tool.name) {
                continue;
            }
            let required = tool.input_schema["required"].as_array().cloned().unwrap_or_default();
            assert!(required.contains(&json!("property_id")), "{}", tool.name);
        }
    }

    /// Fill in a value for one schema node, recursing into required fields.
    fn sample(key: &str, schema: &Value) -> Value {
        if let Some(options) = schema["enum"].as_array() {
            return options[0].clone();
        }
        match schema["type"].as_str() {
            Some("object") => {
                let required = schema["required"].as_array().cloned().unwrap_or_default();
                let object = required
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|field| (field.to_string(), sample(field, &schema["properties"][field])))
                    .collect();
                Value::Object(object)
            }
            Some("array") => json!([sample(key, &schema["items"])]),
            Some("number") | Some("integer") => json!(1),
            Some("boolean") => json!(true),
            Some("string") if key.ends_with("_date") => json!("today"),
            Some("string") => json!("activeUsers"),
            // ids declared as string or number
            _ => json!(123),
        }
    }

    fn minimal_args(tool: &rmcp::model::Tool) -> JsonObject {
        let schema = Value::Object(tool.input_schema.as_ref().clone());
        match sample("", &schema) {
            Value::Object(object) => object,
            other => panic!("{} schema produced {}", tool.name, other),
        }
    }

    #[tokio::test]
    async fn test_every_tool_returns_one_json_envelope() {
        let (_, registry) = registry_with(RecordingBackend::new());

        for tool in registry.list_tools() {
            let name = tool.name.to_string();
            let property_only = tool.input_schema["properties"]
                .as_object()
                .is_some_and(|props| props.len() == 1 && props.contains_key("property_id"));
            let unscoped = tool.input_schema["properties"]
                .as_object()
                .is_some_and(|props| props.is_empty());

            for args in [JsonObject::new(), minimal_args(&tool)] {
                let result = registry.dispatch(&name, args.clone()).await;

                assert_eq!(result.content.len(), 1, "{} {:?}", name, args);
                assert!(result.is_error.is_some(), "{}", name);
                let value: Value = serde_json::from_str(result_text(&result).unwrap())
                    .unwrap_or_else(|e| panic!("{} returned non-JSON text: {}", name, e));

                if result.is_error == Some(true) {
                    let tag = value["error"].as_str().unwrap_or_default();
                    assert!(!tag.is_empty(), "{} error without tag", name);
                    assert_ne!(tag, "UnknownTool", "{}", name);
                    assert_ne!(tag, "ToolExecutionError", "{}: {}", name, value["message"]);
                }
            }

            if property_only || unscoped {
                let result = registry.dispatch(&name, minimal_args(&tool)).await;
                assert_eq!(result.is_error, Some(false), "{}", name);
            }
        }
    }

    #[tokio::test]
    async fn test_account_summaries_round_trip() {
        let summaries = json!({"accountSummaries": [{"account": "accounts/1"}]});
        let (_, registry) = registry_with(RecordingBackend::new().respond(
            Method::GET,
            "accountSummaries",
            summaries.clone(),
        ));

        let result = registry.dispatch("get_account_summaries", JsonObject::new()).await;
        assert_eq!(result.is_error, Some(false));
        assert_eq!(payload(&result), summaries);
    }

    #[tokio::test]
    async fn test_property_id_forms_are_equivalent() {
        let (recorder, registry) = registry_with(RecordingBackend::new());
        let report = |property: Value| {
            args(json!({
                "property_id": property,
                "date_ranges": [{"start_date": "7daysAgo", "end_date": "today"}],
                "metrics": ["activeUsers"]
            }))
        };

        registry.dispatch("run_report", report(json!(123456))).await;
        registry.dispatch("run_report", report(json!("123456"))).await;
        registry.dispatch("run_report", report(json!("properties/123456"))).await;

        let requests = recorder.requests();
        assert_eq!(requests.len(), 3);
        for request in &requests {
            assert_eq!(request.api, Api::Data);
            assert_eq!(request.path, "properties/123456:runReport");
            assert_eq!(request.body, requests[0].body);
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_names_every_tool() {
        let (recorder, registry) = registry_with(RecordingBackend::new());
        let result = registry.dispatch("run_reports_please", JsonObject::new()).await;
        assert_eq!(result.is_error, Some(true));

        let value = payload(&result);
        assert_eq!(value["error"], "UnknownTool");
        let listed: Vec<&str> = value["suggestion"]
            .as_str()
            .unwrap()
            .trim_start_matches("Available tools: ")
            .split(", ")
            .collect();
        for name in registry.list_names() {
            assert_eq!(listed.iter().filter(|n| **n == name).count(), 1, "{}", name);
        }
        assert!(recorder.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_property_is_validation_error() {
        let (recorder, registry) = registry_with(RecordingBackend::new());
        let result = registry.dispatch("list_key_events", JsonObject::new()).await;
        assert_eq!(result.is_error, Some(true));
        let value = payload(&result);
        assert_eq!(value["error"], "ValidationError");
        assert_eq!(value["provided"], Value::Null);
        assert!(recorder.requests().is_empty());
    }
}
