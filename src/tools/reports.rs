//! Core reporting tools backed by the Data API.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Map, Value, json};

use super::analytics_tool::AnalyticsTool;
use super::args::{
    MAX_DIMENSIONS, MAX_METRICS, ToolError, ToolOutcome, check_max, date_ranges, named,
    optional_str, optional_u64, optional_value, property_name, required_string_list, string_list,
};
use super::resource::send;
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

/// Which report request shape to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// `runReport`: date ranges, paging and currency.
    Standard,
    /// `runRealtimeReport`: no date ranges and no offset.
    Realtime,
    /// One entry of `batchRunReports`.
    Batched,
}

/// Translate snake_case report arguments into a Data API request body.
pub fn report_body(args: &JsonObject, kind: ReportKind) -> Result<Map<String, Value>, ToolError> {
    let mut body = Map::new();

    if kind != ReportKind::Realtime {
        let ranges = date_ranges(args.get("date_ranges"), "date_ranges")?;
        body.insert("dateRanges".to_string(), Value::Array(ranges));
    }

    let metrics = required_string_list(args, "metrics")?;
    check_max("metrics", metrics.len(), MAX_METRICS)?;
    body.insert("metrics".to_string(), named(&metrics));

    let dimensions = string_list(args, "dimensions")?;
    check_max("dimensions", dimensions.len(), MAX_DIMENSIONS)?;
    if !dimensions.is_empty() {
        body.insert("dimensions".to_string(), named(&dimensions));
    }

    insert_filters(args, &mut body);
    if let Some(order_bys) = optional_value(args, "order_bys") {
        body.insert("orderBys".to_string(), order_bys.clone());
    }

    if let Some(limit) = optional_u64(args, "limit")? {
        body.insert("limit".to_string(), json!(limit));
    }
    if kind != ReportKind::Realtime
        && let Some(offset) = optional_u64(args, "offset")?
    {
        body.insert("offset".to_string(), json!(offset));
    }
    if kind == ReportKind::Standard
        && let Some(currency) = optional_str(args, "currency_code")?
    {
        body.insert("currencyCode".to_string(), json!(currency));
    }

    Ok(body)
}

/// Copy `dimension_filter` and `metric_filter` through unchanged.
pub fn insert_filters(args: &JsonObject, body: &mut Map<String, Value>) {
    if let Some(filter) = optional_value(args, "dimension_filter") {
        body.insert("dimensionFilter".to_string(), filter.clone());
    }
    if let Some(filter) = optional_value(args, "metric_filter") {
        body.insert("metricFilter".to_string(), filter.clone());
    }
}

/// Properties shared by every report-shaped schema.
pub fn report_properties(kind: ReportKind) -> Map<String, Value> {
    let mut props = Map::new();
    if kind != ReportKind::Realtime {
        props.insert("date_ranges".to_string(), schema::date_ranges());
    }
    props.insert(
        "metrics".to_string(),
        schema::string_array("Metric names (e.g. 'activeUsers', 'sessions'). At most 10."),
    );
    props.insert(
        "dimensions".to_string(),
        schema::string_array("Dimension names (e.g. 'country', 'date'). At most 9."),
    );
    props.insert(
        "dimension_filter".to_string(),
        schema::free_object("FilterExpression applied to dimensions"),
    );
    props.insert(
        "metric_filter".to_string(),
        schema::free_object("FilterExpression applied to metrics"),
    );
    props.insert(
        "order_bys".to_string(),
        schema::object_array("OrderBy objects controlling row order"),
    );
    props.insert("limit".to_string(), schema::number("Maximum number of rows to return"));
    if kind != ReportKind::Realtime {
        props.insert("offset".to_string(), schema::number("Row offset for pagination"));
    }
    if kind == ReportKind::Standard {
        props.insert(
            "currency_code".to_string(),
            schema::string("ISO 4217 currency code, e.g. 'USD'"),
        );
    }
    props
}

fn report_schema(kind: ReportKind) -> JsonObject {
    let mut props = report_properties(kind);
    props.insert("property_id".to_string(), schema::property_id());
    let required: &[&str] = match kind {
        ReportKind::Realtime => &["property_id", "metrics"],
        _ => &["property_id", "date_ranges", "metrics"],
    };
    schema::object(Value::Object(props), required)
}

async fn run_report(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;
    let body = report_body(&args, ReportKind::Standard)?;
    send(
        &backend,
        ApiRequest::post(Api::Data, format!("{}:runReport", property), Value::Object(body)),
    )
    .await
}

async fn run_realtime_report(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;
    let body = report_body(&args, ReportKind::Realtime)?;
    send(
        &backend,
        ApiRequest::post(
            Api::Data,
            format!("{}:runRealtimeReport", property),
            Value::Object(body),
        ),
    )
    .await
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![
        AnalyticsTool::new(
            backend,
            "run_report",
            "Run a Google Analytics report for a property over one or more date ranges, \
             with metrics, optional dimensions, filters, ordering and pagination.",
            "ReportError",
            report_schema(ReportKind::Standard),
            run_report,
        ),
        AnalyticsTool::new(
            backend,
            "run_realtime_report",
            "Run a realtime report covering events from the last 30 minutes.",
            "RealtimeReportError",
            report_schema(ReportKind::Realtime),
            run_realtime_report,
        ),
    ]
}
