//! Audiences (Admin API v1alpha).

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Map, Value, json};

use super::analytics_tool::AnalyticsTool;
use super::args::{ToolOutcome, optional_str, optional_u64, optional_value, property_name, required_str};
use super::resource::{archive, get, list, send};
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

const FILTER_SUGGESTION: &str = "Audience creation requires complex filter expressions. \
     See Google Analytics API documentation for filter expression format.";

async fn create_audience(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;

    let mut body = Map::new();
    body.insert("displayName".to_string(), json!(required_str(&args, "display_name")?));
    if let Some(description) = optional_str(&args, "description")?.filter(|d| !d.is_empty()) {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(days) = optional_u64(&args, "membership_duration_days")? {
        body.insert("membershipDurationDays".to_string(), json!(days));
    }
    if let Some(expression) = optional_value(&args, "filter_expression") {
        body.insert(
            "filterClauses".to_string(),
            json!([{ "filterExpression": expression }]),
        );
    }

    send(
        &backend,
        ApiRequest::post(Api::AdminAlpha, format!("{}/audiences", property), Value::Object(body)),
    )
    .await
}

fn audience_schema() -> JsonObject {
    schema::property_scoped(
        json!({ "audience_id": schema::id("The audience ID") }),
        &["audience_id"],
    )
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![
        AnalyticsTool::new(
            backend,
            "list_audiences",
            "List the audiences defined on a property.",
            "ListAudiencesError",
            schema::property_only(),
            |backend, args| list(backend, args, Api::AdminAlpha, "audiences"),
        ),
        AnalyticsTool::new(
            backend,
            "get_audience",
            "Get one audience, including its filter clauses.",
            "GetAudienceError",
            audience_schema(),
            |backend, args| get(backend, args, Api::AdminAlpha, "audiences", "audience_id"),
        ),
        AnalyticsTool::new(
            backend,
            "create_audience",
            "Create an audience from a filter expression.",
            "CreateAudienceError",
            schema::property_scoped(
                json!({
                    "display_name": schema::string("Name of the audience"),
                    "description": schema::string("Optional description"),
                    "membership_duration_days": schema::number(
                        "Days a user stays in the audience (1-540)"
                    ),
                    "filter_expression": schema::free_object(
                        "AudienceFilterExpression; sent as the single filter clause"
                    ),
                }),
                &["display_name"],
            ),
            create_audience,
        )
        .with_failure_suggestion(FILTER_SUGGESTION),
        AnalyticsTool::new(
            backend,
            "archive_audience",
            "Archive an audience.",
            "ArchiveAudienceError",
            audience_schema(),
            |backend, args| archive(backend, args, Api::AdminAlpha, "audiences", "audience_id"),
        ),
    ]
}
