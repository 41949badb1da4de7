//! Data filters for internal and developer traffic (Admin API v1alpha).

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Map, Value, json};

use super::analytics_tool::AnalyticsTool;
use super::args::{ToolError, ToolOutcome, optional_str, property_name, required_choice, required_str};
use super::envelope::ErrorPayload;
use super::resource::{FieldUpdate, child_name, delete, get, list, send};
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

const FILTER_STATES: &[&str] = &["TESTING", "ACTIVE", "INACTIVE"];
const FILTER_TYPES: &[&str] = &["INTERNAL_TRAFFIC", "DEVELOPER_TRAFFIC"];

/// Filter states are matched without regard to case.
fn filter_state(args: &JsonObject) -> Result<Option<String>, ToolError> {
    let Some(state) = optional_str(args, "filter_state")? else {
        return Ok(None);
    };
    let upper = state.trim().to_ascii_uppercase();
    if FILTER_STATES.contains(&upper.as_str()) {
        return Ok(Some(upper));
    }
    Err(ErrorPayload::validation(
        "filter_state",
        json!(state),
        format!("Expected one of {}", FILTER_STATES.join(", ")),
    )
    .with_valid_options(FILTER_STATES.iter().copied())
    .into())
}

async fn create_data_filter(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;
    let display_name = required_str(&args, "filter_name")?;
    let state = filter_state(&args)?.ok_or_else(|| {
        ErrorPayload::validation(
            "filter_state",
            Value::Null,
            format!("'filter_state' is required. Expected one of {}", FILTER_STATES.join(", ")),
        )
        .with_valid_options(FILTER_STATES.iter().copied())
    })?;

    let mut body = Map::new();
    body.insert("displayName".to_string(), json!(display_name));
    body.insert("filterState".to_string(), json!(state));

    match required_choice(&args, "filter_type", FILTER_TYPES)?.as_str() {
        "INTERNAL_TRAFFIC" => {
            let traffic_type = optional_str(&args, "parameter_value")?
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    ErrorPayload::validation(
                        "parameter_value",
                        Value::Null,
                        "parameter_value is required for INTERNAL_TRAFFIC filters",
                    )
                })?;
            body.insert(
                "internalTrafficFilter".to_string(),
                json!({ "trafficType": traffic_type }),
            );
        }
        _ => {
            body.insert("developerDataFilter".to_string(), json!({}));
        }
    }

    send(
        &backend,
        ApiRequest::post(Api::AdminAlpha, format!("{}/dataFilters", property), Value::Object(body)),
    )
    .await
}

async fn update_data_filter(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let name = child_name(&args, "dataFilters", "data_filter_id")?;
    let display_name = optional_str(&args, "filter_name")?;
    let state = filter_state(&args)?;
    let traffic_type = optional_str(&args, "parameter_value")?;

    let mut update = FieldUpdate::load(&backend, Api::AdminAlpha, name).await?;
    if let Some(display_name) = display_name {
        update.set("display_name", "displayName", json!(display_name));
    }
    if let Some(state) = state {
        update.set("filter_state", "filterState", json!(state));
    }
    if let Some(traffic_type) = traffic_type {
        if update.existing("internalTrafficFilter").is_none() {
            return Err(ToolError::Failed(
                "parameter_value can only be updated for INTERNAL_TRAFFIC filters".to_string(),
            ));
        }
        update.set_nested(
            "internal_traffic_filter.traffic_type",
            "internalTrafficFilter",
            "trafficType",
            json!(traffic_type),
        );
    }

    send(&backend, update.into_request(Api::AdminAlpha)?).await
}

fn filter_schema(extra: Value, required: &[&str]) -> JsonObject {
    schema::child_scoped("data_filter_id", "The data filter ID", extra, required)
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![
        AnalyticsTool::new(
            backend,
            "list_data_filters",
            "List the data filters of a property.",
            "ListDataFiltersError",
            schema::property_only(),
            |backend, args| list(backend, args, Api::AdminAlpha, "dataFilters"),
        ),
        AnalyticsTool::new(
            backend,
            "get_data_filter",
            "Get one data filter.",
            "GetDataFilterError",
            filter_schema(json!({}), &[]),
            |backend, args| get(backend, args, Api::AdminAlpha, "dataFilters", "data_filter_id"),
        ),
        AnalyticsTool::new(
            backend,
            "create_data_filter",
            "Create a filter that excludes internal or developer traffic.",
            "CreateDataFilterError",
            schema::property_scoped(
                json!({
                    "filter_name": schema::string("Display name of the filter"),
                    "filter_type": schema::choice("Kind of traffic to filter", FILTER_TYPES),
                    "filter_state": schema::choice("Initial state (case-insensitive)", FILTER_STATES),
                    "parameter_value": schema::string(
                        "traffic_type parameter value; required for INTERNAL_TRAFFIC"
                    ),
                }),
                &["filter_name", "filter_type", "filter_state"],
            ),
            create_data_filter,
        ),
        AnalyticsTool::new(
            backend,
            "update_data_filter",
            "Rename a data filter, change its state, or change its traffic type.",
            "UpdateDataFilterError",
            filter_schema(
                json!({
                    "filter_name": schema::string("New display name"),
                    "filter_state": schema::choice("New state (case-insensitive)", FILTER_STATES),
                    "parameter_value": schema::string(
                        "New traffic_type value; INTERNAL_TRAFFIC filters only"
                    ),
                }),
                &[],
            ),
            update_data_filter,
        ),
        AnalyticsTool::new(
            backend,
            "delete_data_filter",
            "Delete a data filter.",
            "DeleteDataFilterError",
            filter_schema(json!({}), &[]),
            |backend, args| delete(backend, args, Api::AdminAlpha, "dataFilters", "data_filter_id"),
        ),
    ]
}
