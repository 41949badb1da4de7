//! Conversion events, kept for properties that still use them.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Map, Value, json};

use super::analytics_tool::AnalyticsTool;
use super::args::{ToolOutcome, optional_choice, optional_str, property_name, required_str};
use super::resource::{delete, get, list, send};
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

const COUNTING_METHODS: &[&str] = &["ONE_PER_EVENT", "ONE_PER_SESSION"];

async fn create_conversion_event(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;

    let mut body = Map::new();
    body.insert("eventName".to_string(), json!(required_str(&args, "event_name")?));
    if let Some(method) = optional_choice(&args, "counting_method", COUNTING_METHODS)? {
        body.insert("countingMethod".to_string(), json!(method));
    }
    if let Some(parameter) = optional_str(&args, "event_creation_parameter")? {
        body.insert("eventCreationParameter".to_string(), json!(parameter));
    }

    send(
        &backend,
        ApiRequest::post(
            Api::Admin,
            format!("{}/conversionEvents", property),
            Value::Object(body),
        ),
    )
    .await
}

fn conversion_schema() -> JsonObject {
    schema::property_scoped(
        json!({ "conversion_event_id": schema::id("The conversion event ID") }),
        &["conversion_event_id"],
    )
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![
        AnalyticsTool::new(
            backend,
            "list_conversion_events",
            "List the conversion events configured on a property.",
            "ListConversionEventsError",
            schema::property_only(),
            |backend, args| list(backend, args, Api::Admin, "conversionEvents"),
        ),
        AnalyticsTool::new(
            backend,
            "get_conversion_event",
            "Get one conversion event.",
            "GetConversionEventError",
            conversion_schema(),
            |backend, args| get(backend, args, Api::Admin, "conversionEvents", "conversion_event_id"),
        ),
        AnalyticsTool::new(
            backend,
            "create_conversion_event",
            "Mark an event as a conversion.",
            "CreateConversionEventError",
            schema::property_scoped(
                json!({
                    "event_name": schema::string("Name of the event to mark as a conversion"),
                    "counting_method": schema::choice("How occurrences are counted", COUNTING_METHODS),
                    "event_creation_parameter": schema::string(
                        "Optional parameter used when the conversion creates an event"
                    ),
                }),
                &["event_name"],
            ),
            create_conversion_event,
        ),
        AnalyticsTool::new(
            backend,
            "delete_conversion_event",
            "Delete a conversion event.",
            "DeleteConversionEventError",
            conversion_schema(),
            |backend, args| {
                delete(backend, args, Api::Admin, "conversionEvents", "conversion_event_id")
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{RecordingBackend, call};
    use reqwest::Method;

    #[tokio::test]
    async fn test_conversion_event_lifecycle() {
        let recorder = Arc::new(RecordingBackend::new());
        let backend: Arc<dyn AnalyticsBackend> = recorder.clone();
        let tools = tools(&backend);

        call(
            &tools,
            "create_conversion_event",
            json!({"property_id": 6, "event_name": "sign_up", "counting_method": "ONE_PER_SESSION"}),
        )
        .await;
        let request = recorder.last_request();
        assert_eq!(request.path, "properties/6/conversionEvents");
        assert_eq!(
            request.body,
            Some(json!({"eventName": "sign_up", "countingMethod": "ONE_PER_SESSION"}))
        );

        call(&tools, "get_conversion_event", json!({"property_id": 6, "conversion_event_id": 2})).await;
        assert_eq!(recorder.last_request().path, "properties/6/conversionEvents/2");

        let (is_error, value) = call(
            &tools,
            "delete_conversion_event",
            json!({"property_id": 6, "conversion_event_id": 2}),
        )
        .await;
        assert!(!is_error);
        assert_eq!(value, json!({"success": true}));
        assert_eq!(recorder.last_request().method, Method::DELETE);
    }

    #[tokio::test]
    async fn test_key_event_counting_methods_are_rejected() {
        let recorder = Arc::new(RecordingBackend::new());
        let backend: Arc<dyn AnalyticsBackend> = recorder.clone();
        let tools = tools(&backend);

        let (is_error, payload) = call(
            &tools,
            "create_conversion_event",
            json!({"property_id": 6, "event_name": "sign_up", "counting_method": "ONCE_PER_EVENT"}),
        )
        .await;
        assert!(is_error);
        assert_eq!(payload["error"], "ValidationError");
        assert_eq!(payload["validOptions"], json!(["ONE_PER_EVENT", "ONE_PER_SESSION"]));
    }
}
