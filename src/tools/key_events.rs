//! Key events (the successor to conversion events).

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Map, Value, json};

use super::analytics_tool::AnalyticsTool;
use super::args::{ToolError, ToolOutcome, optional_choice, optional_str, property_name, required_str};
use super::resource::{child_name, delete, get, list, send};
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiError, ApiRequest};

const COUNTING_METHODS: &[&str] = &["ONCE_PER_EVENT", "ONCE_PER_SESSION"];

async fn create_key_event(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;

    let mut body = Map::new();
    body.insert("eventName".to_string(), json!(required_str(&args, "event_name")?));
    if let Some(method) = optional_choice(&args, "counting_method", COUNTING_METHODS)? {
        body.insert("countingMethod".to_string(), json!(method));
    }
    if let Some(description) = optional_str(&args, "description")?.filter(|d| !d.is_empty()) {
        body.insert("description".to_string(), json!(description));
    }

    send(
        &backend,
        ApiRequest::post(Api::Admin, format!("{}/keyEvents", property), Value::Object(body)),
    )
    .await
}

/// Confirm the key event exists, then PATCH only the supplied fields.
///
/// The body carries the resource name rather than the fetched state.
async fn update_key_event(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let name = child_name(&args, "keyEvents", "key_event_id")?;

    let existing = match backend.send(ApiRequest::get(Api::Admin, name.clone())).await {
        Ok(value) => value,
        Err(ApiError::Status { status: 404, .. }) => Value::Null,
        Err(e) => return Err(e.into()),
    };
    if existing.as_object().is_none_or(|event| event.is_empty()) {
        return Err(ToolError::Failed(format!("Key event not found: {}", name)));
    }

    let mut body = Map::new();
    body.insert("name".to_string(), json!(name));
    let mut mask = Vec::new();
    if let Some(method) = optional_choice(&args, "counting_method", COUNTING_METHODS)? {
        body.insert("countingMethod".to_string(), json!(method));
        mask.push("counting_method");
    }
    if let Some(description) = optional_str(&args, "description")? {
        body.insert("description".to_string(), json!(description));
        mask.push("description");
    }
    if mask.is_empty() {
        return Err(ToolError::Failed("No fields provided for update".to_string()));
    }

    send(
        &backend,
        ApiRequest::patch(Api::Admin, name, Value::Object(body)).query("updateMask", mask.join(",")),
    )
    .await
}

fn key_event_schema(extra: Value, required: &[&str]) -> JsonObject {
    schema::child_scoped("key_event_id", "The key event ID", extra, required)
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![
        AnalyticsTool::new(
            backend,
            "list_key_events",
            "List the key events configured on a property.",
            "ListKeyEventsError",
            schema::property_only(),
            |backend, args| list(backend, args, Api::Admin, "keyEvents"),
        ),
        AnalyticsTool::new(
            backend,
            "get_key_event",
            "Get one key event.",
            "GetKeyEventError",
            key_event_schema(json!({}), &[]),
            |backend, args| get(backend, args, Api::Admin, "keyEvents", "key_event_id"),
        ),
        AnalyticsTool::new(
            backend,
            "create_key_event",
            "Mark an event as a key event.",
            "CreateKeyEventError",
            schema::property_scoped(
                json!({
                    "event_name": schema::string("Name of the event to mark as a key event"),
                    "counting_method": schema::choice("How occurrences are counted", COUNTING_METHODS),
                    "description": schema::string("Optional description"),
                }),
                &["event_name"],
            ),
            create_key_event,
        ),
        AnalyticsTool::new(
            backend,
            "update_key_event",
            "Change the counting method or description of a key event.",
            "UpdateKeyEventError",
            key_event_schema(
                json!({
                    "counting_method": schema::choice("How occurrences are counted", COUNTING_METHODS),
                    "description": schema::string("New description"),
                }),
                &[],
            ),
            update_key_event,
        ),
        AnalyticsTool::new(
            backend,
            "archive_key_event",
            "Stop treating an event as a key event.",
            "ArchiveKeyEventError",
            key_event_schema(json!({}), &[]),
            |backend, args| delete(backend, args, Api::Admin, "keyEvents", "key_event_id"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{RecordingBackend, call};
    use reqwest::Method;

    fn setup() -> (Arc<RecordingBackend>, Vec<AnalyticsTool>) {
        let recorder = Arc::new(RecordingBackend::new());
        let backend: Arc<dyn AnalyticsBackend> = recorder.clone();
        (recorder, tools(&backend))
    }

    #[tokio::test]
    async fn test_create_key_event() {
        let (recorder, tools) = setup();
        let (is_error, _) = call(
            &tools,
            "create_key_event",
            json!({"property_id": 3, "event_name": "purchase", "counting_method": "ONCE_PER_SESSION"}),
        )
        .await;
        assert!(!is_error);

        let request = recorder.last_request();
        assert_eq!(request.path, "properties/3/keyEvents");
        assert_eq!(
            request.body,
            Some(json!({"eventName": "purchase", "countingMethod": "ONCE_PER_SESSION"}))
        );
    }

    #[tokio::test]
    async fn test_counting_method_is_checked() {
        let (recorder, tools) = setup();
        let (is_error, payload) = call(
            &tools,
            "create_key_event",
            json!({"property_id": 3, "event_name": "purchase", "counting_method": "ONE_PER_EVENT"}),
        )
        .await;
        assert!(is_error);
        assert_eq!(payload["validOptions"], json!(COUNTING_METHODS));
        assert!(recorder.requests().is_empty());
    }

    fn with_key_event() -> (Arc<RecordingBackend>, Vec<AnalyticsTool>) {
        let recorder = Arc::new(RecordingBackend::new().respond(
            Method::GET,
            "properties/3/keyEvents/11",
            json!({"name": "properties/3/keyEvents/11", "eventName": "purchase"}),
        ));
        let backend: Arc<dyn AnalyticsBackend> = recorder.clone();
        (recorder, tools(&backend))
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_fields() {
        let (recorder, tools) = with_key_event();
        call(
            &tools,
            "update_key_event",
            json!({"property_id": 3, "key_event_id": "11", "description": "Checkout"}),
        )
        .await;

        let requests = recorder.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].path, "properties/3/keyEvents/11");

        let request = &requests[1];
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(request.query_value("updateMask"), Some("description"));
        assert_eq!(
            request.body,
            Some(json!({"name": "properties/3/keyEvents/11", "description": "Checkout"}))
        );
    }

    #[tokio::test]
    async fn test_update_without_fields_fails() {
        let (recorder, tools) = with_key_event();
        let (is_error, payload) = call(
            &tools,
            "update_key_event",
            json!({"property_id": 3, "key_event_id": "11"}),
        )
        .await;
        assert!(is_error);
        assert_eq!(payload["error"], "UpdateKeyEventError");
        assert_eq!(payload["message"], "No fields provided for update");
        assert!(recorder.requests().iter().all(|r| r.method == Method::GET));
    }

    #[tokio::test]
    async fn test_update_missing_key_event_is_not_patched() {
        let recorder = Arc::new(RecordingBackend::new().fail(
            Method::GET,
            "properties/3/keyEvents/404",
            ApiError::Status {
                status: 404,
                code: Some("NOT_FOUND".to_string()),
                message: "Requested entity was not found.".to_string(),
            },
        ));
        let backend: Arc<dyn AnalyticsBackend> = recorder.clone();
        let tools = tools(&backend);

        let (is_error, payload) = call(
            &tools,
            "update_key_event",
            json!({"property_id": 3, "key_event_id": 404, "description": "Checkout"}),
        )
        .await;
        assert!(is_error);
        assert_eq!(payload["error"], "UpdateKeyEventError");
        assert_eq!(payload["message"], "Key event not found: properties/3/keyEvents/404");
        assert_eq!(recorder.requests().len(), 1);

        // An empty body is treated the same way.
        let (is_error, payload) = call(
            &tools,
            "update_key_event",
            json!({"property_id": 3, "key_event_id": 12, "description": "Checkout"}),
        )
        .await;
        assert!(is_error);
        assert_eq!(payload["message"], "Key event not found: properties/3/keyEvents/12");
    }

    #[tokio::test]
    async fn test_archive_deletes() {
        let (recorder, tools) = setup();
        let (_, value) = call(
            &tools,
            "archive_key_event",
            json!({"property_id": "properties/3", "key_event_id": 11}),
        )
        .await;
        assert_eq!(value, json!({"success": true}));
        let request = recorder.last_request();
        assert_eq!(request.method, Method::DELETE);
        assert_eq!(request.path, "properties/3/keyEvents/11");
    }
}
