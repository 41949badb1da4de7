//! Links to Firebase, BigQuery and AdSense.
//!
//! Firebase links live on the v1beta Admin API, which has no single-link
//! GET; `get_firebase_link` lists the links and picks the match. BigQuery
//! and AdSense links are only exposed by v1alpha.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Value, json};

use super::analytics_tool::AnalyticsTool;
use super::args::{ToolError, ToolOutcome, property_name, required_str};
use super::resource::{child_name, delete, get, list, send};
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

async fn get_firebase_link(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let name = child_name(&args, "firebaseLinks", "firebase_link_id")?;
    let property = property_name(&args)?;

    let page = backend
        .send(ApiRequest::get(Api::Admin, format!("{}/firebaseLinks", property)))
        .await?;
    page.get("firebaseLinks")
        .and_then(Value::as_array)
        .and_then(|links| {
            links
                .iter()
                .find(|link| link.get("name").and_then(Value::as_str) == Some(name.as_str()))
        })
        .cloned()
        .ok_or_else(|| ToolError::Failed(format!("Firebase link not found: {}", name)))
}

async fn create_firebase_link(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;
    let project = required_str(&args, "project_id")?;
    send(
        &backend,
        ApiRequest::post(
            Api::Admin,
            format!("{}/firebaseLinks", property),
            json!({ "project": project }),
        ),
    )
    .await
}

fn link_schema(id_key: &str, description: &str) -> JsonObject {
    schema::child_scoped(id_key, description, json!({}), &[])
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![
        AnalyticsTool::new(
            backend,
            "list_firebase_links",
            "List the Firebase projects linked to a property.",
            "ListFirebaseLinksError",
            schema::property_only(),
            |backend, args| list(backend, args, Api::Admin, "firebaseLinks"),
        ),
        AnalyticsTool::new(
            backend,
            "get_firebase_link",
            "Get one Firebase link.",
            "GetFirebaseLinkError",
            link_schema("firebase_link_id", "The Firebase link ID"),
            get_firebase_link,
        ),
        AnalyticsTool::new(
            backend,
            "create_firebase_link",
            "Link a Firebase project to a property.",
            "CreateFirebaseLinkError",
            schema::property_scoped(
                json!({
                    "project_id": schema::string(
                        "Firebase project to link, as 'projects/PROJECT' or a project number"
                    ),
                }),
                &["project_id"],
            ),
            create_firebase_link,
        ),
        AnalyticsTool::new(
            backend,
            "delete_firebase_link",
            "Remove a Firebase link from a property.",
            "DeleteFirebaseLinkError",
            link_schema("firebase_link_id", "The Firebase link ID"),
            |backend, args| delete(backend, args, Api::Admin, "firebaseLinks", "firebase_link_id"),
        ),
        AnalyticsTool::new(
            backend,
            "list_bigquery_links",
            "List the BigQuery export links of a property.",
            "ListBigQueryLinksError",
            schema::property_only(),
            |backend, args| list(backend, args, Api::AdminAlpha, "bigQueryLinks"),
        ),
        AnalyticsTool::new(
            backend,
            "get_bigquery_link",
            "Get one BigQuery export link.",
            "GetBigQueryLinkError",
            link_schema("bigquery_link_id", "The BigQuery link ID"),
            |backend, args| {
                get(backend, args, Api::AdminAlpha, "bigQueryLinks", "bigquery_link_id")
            },
        ),
        AnalyticsTool::new(
            backend,
            "list_adsense_links",
            "List the AdSense links of a property.",
            "ListAdSenseLinksError",
            schema::property_only(),
            |backend, args| list(backend, args, Api::AdminAlpha, "adSenseLinks"),
        ),
        AnalyticsTool::new(
            backend,
            "get_adsense_link",
            "Get one AdSense link.",
            "GetAdSenseLinkError",
            link_schema("adsense_link_id", "The AdSense link ID"),
            |backend, args| get(backend, args, Api::AdminAlpha, "adSenseLinks", "adsense_link_id"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{RecordingBackend, call};
    use reqwest::Method;

    fn with(recorder: RecordingBackend) -> (Arc<RecordingBackend>, Vec<AnalyticsTool>) {
        let recorder = Arc::new(recorder);
        let backend: Arc<dyn AnalyticsBackend> = recorder.clone();
        (recorder, tools(&backend))
    }

    fn links() -> Value {
        json!({
            "firebaseLinks": [
                {"name": "properties/5/firebaseLinks/1", "project": "projects/111"},
                {"name": "properties/5/firebaseLinks/2", "project": "projects/222"}
            ]
        })
    }

    #[tokio::test]
    async fn test_get_firebase_link_searches_list() {
        let (recorder, tools) = with(RecordingBackend::new().respond(
            Method::GET,
            "properties/5/firebaseLinks",
            links(),
        ));

        let (is_error, value) = call(
            &tools,
            "get_firebase_link",
            json!({"property_id": 5, "firebase_link_id": "2"}),
        )
        .await;
        assert!(!is_error);
        assert_eq!(value["project"], "projects/222");
        assert_eq!(recorder.last_request().path, "properties/5/firebaseLinks");
    }

    #[tokio::test]
    async fn test_missing_firebase_link() {
        let (_, tools) = with(RecordingBackend::new().respond(
            Method::GET,
            "properties/5/firebaseLinks",
            links(),
        ));

        let (is_error, payload) = call(
            &tools,
            "get_firebase_link",
            json!({"property_id": 5, "firebase_link_id": 9}),
        )
        .await;
        assert!(is_error);
        assert_eq!(payload["error"], "GetFirebaseLinkError");
        assert_eq!(payload["message"], "Firebase link not found: properties/5/firebaseLinks/9");
    }

    #[tokio::test]
    async fn test_create_firebase_link_body() {
        let (recorder, tools) = with(RecordingBackend::new());
        call(
            &tools,
            "create_firebase_link",
            json!({"property_id": 5, "project_id": "projects/333"}),
        )
        .await;
        let request = recorder.last_request();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Some(json!({"project": "projects/333"})));
    }

    #[tokio::test]
    async fn test_alpha_links_use_alpha_api() {
        let (recorder, tools) = with(RecordingBackend::new());

        call(&tools, "list_bigquery_links", json!({"property_id": 5})).await;
        let request = recorder.last_request();
        assert_eq!(request.api, Api::AdminAlpha);
        assert_eq!(request.path, "properties/5/bigQueryLinks");

        call(&tools, "get_adsense_link", json!({"property_id": 5, "adsense_link_id": "x"})).await;
        let request = recorder.last_request();
        assert_eq!(request.api, Api::AdminAlpha);
        assert_eq!(request.path, "properties/5/adSenseLinks/x");
    }
}
