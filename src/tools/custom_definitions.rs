//! Custom dimension and custom metric management.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Map, Value, json};

use super::analytics_tool::AnalyticsTool;
use super::args::{
    ToolError, ToolOutcome, optional_choice, optional_str, property_name, required_choice, required_str,
    string_list,
};
use super::resource::{FieldUpdate, archive, child_name, send};
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

const SCOPES: &[&str] = &["EVENT", "USER"];
const MEASUREMENT_UNITS: &[&str] = &["STANDARD", "CURRENCY", "FEET", "METERS", "KILOMETERS", "MILES"];

/// Fields common to both definition kinds.
fn definition_body(args: &JsonObject) -> Result<Map<String, Value>, ToolError> {
    let mut body = Map::new();
    body.insert("parameterName".to_string(), json!(required_str(args, "parameter_name")?));
    body.insert("displayName".to_string(), json!(required_str(args, "display_name")?));
    body.insert("scope".to_string(), json!(required_choice(args, "scope", SCOPES)?));
    if let Some(description) = optional_str(args, "description")?.filter(|d| !d.is_empty()) {
        body.insert("description".to_string(), json!(description));
    }
    Ok(body)
}

async fn create_custom_dimension(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;
    let body = definition_body(&args)?;
    send(
        &backend,
        ApiRequest::post(Api::Admin, format!("{}/customDimensions", property), Value::Object(body)),
    )
    .await
}

async fn create_custom_metric(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;
    let mut body = definition_body(&args)?;
    if let Some(unit) = optional_choice(&args, "measurement_unit", MEASUREMENT_UNITS)? {
        body.insert("measurementUnit".to_string(), json!(unit));
    }
    let restricted = string_list(&args, "restricted_metric_type")?;
    if !restricted.is_empty() {
        body.insert("restrictedMetricType".to_string(), json!(restricted));
    }
    send(
        &backend,
        ApiRequest::post(Api::Admin, format!("{}/customMetrics", property), Value::Object(body)),
    )
    .await
}

/// Overlay `display_name` and `description` onto the stored definition.
async fn update_definition(
    backend: Arc<dyn AnalyticsBackend>,
    args: JsonObject,
    collection: &'static str,
    id_key: &'static str,
) -> ToolOutcome {
    let name = child_name(&args, collection, id_key)?;
    let display_name = optional_str(&args, "display_name")?;
    let description = optional_str(&args, "description")?;

    let mut update = FieldUpdate::load(&backend, Api::Admin, name).await?;
    if let Some(display_name) = display_name {
        update.set("display_name", "displayName", json!(display_name));
    }
    if let Some(description) = description {
        update.set("description", "description", json!(description));
    }
    send(&backend, update.into_request(Api::Admin)?).await
}

fn create_schema(metric: bool) -> JsonObject {
    let mut props = json!({
        "parameter_name": schema::string("Event or user parameter the definition reads"),
        "display_name": schema::string("Name shown in the Analytics UI"),
        "description": schema::string("Optional description"),
        "scope": schema::choice("Scope of the definition", SCOPES),
    });
    if metric && let Some(props) = props.as_object_mut() {
        props.insert(
            "measurement_unit".to_string(),
            schema::choice("Unit of the metric value", MEASUREMENT_UNITS),
        );
        props.insert(
            "restricted_metric_type".to_string(),
            schema::string_array("Restricted data types, e.g. COST_DATA or REVENUE_DATA"),
        );
    }
    schema::property_scoped(props, &["parameter_name", "display_name", "scope"])
}

fn update_schema(id_key: &str) -> JsonObject {
    schema::child_scoped(
        id_key,
        "The definition ID",
        json!({
            "display_name": schema::string("New display name"),
            "description": schema::string("New description"),
        }),
        &[],
    )
}

fn id_schema(id_key: &str) -> JsonObject {
    schema::child_scoped(id_key, "The definition ID", json!({}), &[])
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![
        AnalyticsTool::new(
            backend,
            "create_custom_dimension",
            "Create a custom dimension from an event or user parameter.",
            "CreateCustomDimensionError",
            create_schema(false),
            create_custom_dimension,
        ),
        AnalyticsTool::new(
            backend,
            "update_custom_dimension",
            "Change the display name or description of a custom dimension.",
            "UpdateCustomDimensionError",
            update_schema("custom_dimension_id"),
            |backend, args| update_definition(backend, args, "customDimensions", "custom_dimension_id"),
        ),
        AnalyticsTool::new(
            backend,
            "archive_custom_dimension",
            "Archive a custom dimension so it no longer collects data.",
            "ArchiveCustomDimensionError",
            id_schema("custom_dimension_id"),
            |backend, args| {
                archive(backend, args, Api::Admin, "customDimensions", "custom_dimension_id")
            },
        ),
        AnalyticsTool::new(
            backend,
            "create_custom_metric",
            "Create a custom metric from a numeric event parameter.",
            "CreateCustomMetricError",
            create_schema(true),
            create_custom_metric,
        ),
        AnalyticsTool::new(
            backend,
            "update_custom_metric",
            "Change the display name or description of a custom metric.",
            "UpdateCustomMetricError",
            update_schema("custom_metric_id"),
            |backend, args| update_definition(backend, args, "customMetrics", "custom_metric_id"),
        ),
        AnalyticsTool::new(
            backend,
            "archive_custom_metric",
            "Archive a custom metric so it no longer collects data.",
            "ArchiveCustomMetricError",
            id_schema("custom_metric_id"),
            |backend, args| archive(backend, args, Api::Admin, "customMetrics", "custom_metric_id"),
        ),
    ]
}
