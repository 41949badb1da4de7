//! Data streams and their Measurement Protocol secrets.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Value, json};

use super::analytics_tool::AnalyticsTool;
use super::args::{ToolError, ToolOutcome, required_id, required_str};
use super::resource::{child_name, get, list, send};
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

fn stream_name(args: &JsonObject) -> Result<String, ToolError> {
    child_name(args, "dataStreams", "data_stream_id")
}

async fn list_measurement_protocol_secrets(
    backend: Arc<dyn AnalyticsBackend>,
    args: JsonObject,
) -> ToolOutcome {
    let stream = stream_name(&args)?;
    send(
        &backend,
        ApiRequest::get(Api::Admin, format!("{}/measurementProtocolSecrets", stream)),
    )
    .await
}

async fn create_measurement_protocol_secret(
    backend: Arc<dyn AnalyticsBackend>,
    args: JsonObject,
) -> ToolOutcome {
    let stream = stream_name(&args)?;
    let display_name = required_str(&args, "display_name")?;
    send(
        &backend,
        ApiRequest::post(
            Api::Admin,
            format!("{}/measurementProtocolSecrets", stream),
            json!({ "displayName": display_name }),
        ),
    )
    .await
}

async fn delete_measurement_protocol_secret(
    backend: Arc<dyn AnalyticsBackend>,
    args: JsonObject,
) -> ToolOutcome {
    let stream = stream_name(&args)?;
    let secret = required_id(&args, "secret_id")?;
    backend
        .send(ApiRequest::delete(
            Api::Admin,
            format!("{}/measurementProtocolSecrets/{}", stream, secret),
        ))
        .await?;
    Ok(json!({ "success": true }))
}

fn stream_schema(extra: Value, required: &[&str]) -> JsonObject {
    schema::child_scoped("data_stream_id", "The data stream ID", extra, required)
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![
        AnalyticsTool::new(
            backend,
            "list_data_streams",
            "List the web, iOS and Android data streams of a property.",
            "ListDataStreamsError",
            schema::property_only(),
            |backend, args| list(backend, args, Api::Admin, "dataStreams"),
        ),
        AnalyticsTool::new(
            backend,
            "get_data_stream",
            "Get one data stream, including its measurement ID or app ID.",
            "GetDataStreamError",
            stream_schema(json!({}), &[]),
            |backend, args| get(backend, args, Api::Admin, "dataStreams", "data_stream_id"),
        ),
        AnalyticsTool::new(
            backend,
            "list_measurement_protocol_secrets",
            "List the Measurement Protocol API secrets of a data stream.",
            "ListMeasurementProtocolSecretsError",
            stream_schema(json!({}), &[]),
            list_measurement_protocol_secrets,
        ),
        AnalyticsTool::new(
            backend,
            "create_measurement_protocol_secret",
            "Create a Measurement Protocol API secret on a data stream.",
            "CreateMeasurementProtocolSecretError",
            stream_schema(
                json!({ "display_name": schema::string("Human-readable name for the secret") }),
                &["display_name"],
            ),
            create_measurement_protocol_secret,
        ),
        AnalyticsTool::new(
            backend,
            "delete_measurement_protocol_secret",
            "Delete a Measurement Protocol API secret.",
            "DeleteMeasurementProtocolSecretError",
            stream_schema(json!({ "secret_id": schema::id("The secret ID") }), &["secret_id"]),
            delete_measurement_protocol_secret,
        ),
    ]
}
