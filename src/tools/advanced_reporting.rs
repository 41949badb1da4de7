//! Batch, pivot and compatibility calls against the Data API.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Map, Value, json};

use super::analytics_tool::AnalyticsTool;
use super::args::{
    MAX_BATCH_REQUESTS, MAX_DIMENSIONS, MAX_METRICS, ToolError, ToolOutcome, check_max,
    date_ranges, named, optional_choice, optional_u64, optional_value, property_name,
    required_string_list, string_list,
};
use super::envelope::ErrorPayload;
use super::reports::{ReportKind, insert_filters, report_body, report_properties};
use super::resource::send;
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

const COMPATIBILITY_OPTIONS: &[&str] = &["COMPATIBLE", "INCOMPATIBLE"];

async fn batch_run_reports(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;

    let expected = "Expected a non-empty array of report request objects";
    let value = optional_value(&args, "requests").unwrap_or(&Value::Null);
    let entries = value
        .as_array()
        .filter(|entries| !entries.is_empty())
        .ok_or_else(|| ErrorPayload::validation("requests", value.clone(), expected))?;
    check_max("requests", entries.len(), MAX_BATCH_REQUESTS)?;

    let requests = entries
        .iter()
        .map(|entry| {
            let entry = entry
                .as_object()
                .ok_or_else(|| ErrorPayload::validation("requests", entry.clone(), expected))?;
            report_body(entry, ReportKind::Batched).map(Value::Object)
        })
        .collect::<Result<Vec<_>, ToolError>>()?;

    send(
        &backend,
        ApiRequest::post(
            Api::Data,
            format!("{}:batchRunReports", property),
            json!({ "requests": requests }),
        ),
    )
    .await
}

fn pivot(entry: &Value) -> Result<Value, ToolError> {
    let expected = "Expected {field_names, limit?, offset?, order_bys?}";
    let entry = entry
        .as_object()
        .ok_or_else(|| ErrorPayload::validation("pivots", entry.clone(), expected))?;

    let mut out = Map::new();
    out.insert(
        "fieldNames".to_string(),
        json!(required_string_list(entry, "field_names")?),
    );
    if let Some(limit) = optional_u64(entry, "limit")? {
        out.insert("limit".to_string(), json!(limit));
    }
    if let Some(offset) = optional_u64(entry, "offset")? {
        out.insert("offset".to_string(), json!(offset));
    }
    if let Some(order_bys) = optional_value(entry, "order_bys") {
        out.insert("orderBys".to_string(), order_bys.clone());
    }
    Ok(Value::Object(out))
}

async fn run_pivot_report(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;

    let mut body = Map::new();
    let ranges = date_ranges(args.get("date_ranges"), "date_ranges")?;
    body.insert("dateRanges".to_string(), Value::Array(ranges));

    let metrics = required_string_list(&args, "metrics")?;
    check_max("metrics", metrics.len(), MAX_METRICS)?;
    body.insert("metrics".to_string(), named(&metrics));

    let dimensions = string_list(&args, "dimensions")?;
    check_max("dimensions", dimensions.len(), MAX_DIMENSIONS)?;
    if !dimensions.is_empty() {
        body.insert("dimensions".to_string(), named(&dimensions));
    }

    let value = optional_value(&args, "pivots").unwrap_or(&Value::Null);
    let pivots = value
        .as_array()
        .filter(|pivots| !pivots.is_empty())
        .ok_or_else(|| {
            ErrorPayload::validation("pivots", value.clone(), "Expected a non-empty array of pivots")
        })?
        .iter()
        .map(pivot)
        .collect::<Result<Vec<_>, _>>()?;
    body.insert("pivots".to_string(), Value::Array(pivots));

    insert_filters(&args, &mut body);

    send(
        &backend,
        ApiRequest::post(Api::Data, format!("{}:runPivotReport", property), Value::Object(body)),
    )
    .await
}

async fn check_compatibility(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;

    let mut body = Map::new();
    let dimensions = string_list(&args, "dimensions")?;
    if !dimensions.is_empty() {
        body.insert("dimensions".to_string(), named(&dimensions));
    }
    let metrics = string_list(&args, "metrics")?;
    if !metrics.is_empty() {
        body.insert("metrics".to_string(), named(&metrics));
    }
    insert_filters(&args, &mut body);
    if let Some(filter) = optional_choice(&args, "compatibility_filter", COMPATIBILITY_OPTIONS)? {
        body.insert("compatibilityFilter".to_string(), json!(filter));
    }

    send(
        &backend,
        ApiRequest::post(
            Api::Data,
            format!("{}:checkCompatibility", property),
            Value::Object(body),
        ),
    )
    .await
}

fn batch_schema() -> JsonObject {
    let request = json!({
        "type": "object",
        "properties": report_properties(ReportKind::Batched),
        "required": ["date_ranges", "metrics"],
    });
    schema::object(
        json!({
            "property_id": schema::property_id(),
            "requests": {
                "type": "array",
                "description": "Report requests to run together (at most 50)",
                "items": request,
            },
        }),
        &["property_id", "requests"],
    )
}

fn pivot_schema() -> JsonObject {
    schema::object(
        json!({
            "property_id": schema::property_id(),
            "date_ranges": schema::date_ranges(),
            "metrics": schema::string_array("Metric names. At most 10."),
            "dimensions": schema::string_array("Dimension names. At most 9."),
            "pivots": {
                "type": "array",
                "description": "Pivot definitions",
                "items": {
                    "type": "object",
                    "properties": {
                        "field_names": schema::string_array("Dimension names shown as pivot columns"),
                        "limit": schema::number("Number of unique combinations to return"),
                        "offset": schema::number("Row offset of the first combination"),
                        "order_bys": schema::object_array("Ordering within the pivot"),
                    },
                    "required": ["field_names"],
                },
            },
            "dimension_filter": schema::free_object("FilterExpression applied to dimensions"),
            "metric_filter": schema::free_object("FilterExpression applied to metrics"),
        }),
        &["property_id", "date_ranges", "metrics", "pivots"],
    )
}

fn compatibility_schema() -> JsonObject {
    schema::object(
        json!({
            "property_id": schema::property_id(),
            "dimensions": schema::string_array("Dimension names to check"),
            "metrics": schema::string_array("Metric names to check"),
            "dimension_filter": schema::free_object("FilterExpression applied to dimensions"),
            "metric_filter": schema::free_object("FilterExpression applied to metrics"),
            "compatibility_filter": schema::choice(
                "Only return fields with this compatibility",
                COMPATIBILITY_OPTIONS,
            ),
        }),
        &["property_id"],
    )
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![
        AnalyticsTool::new(
            backend,
            "batch_run_reports",
            "Run up to 50 reports for the same property in one request.",
            "BatchRunReportsError",
            batch_schema(),
            batch_run_reports,
        ),
        AnalyticsTool::new(
            backend,
            "run_pivot_report",
            "Run a pivot report that cross-tabulates dimensions into columns.",
            "PivotReportError",
            pivot_schema(),
            run_pivot_report,
        ),
        AnalyticsTool::new(
            backend,
            "check_compatibility",
            "Check which dimensions and metrics can be combined in a report.",
            "CompatibilityCheckError",
            compatibility_schema(),
            check_compatibility,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::envelope::result_text;
    use crate::tools::registry::ToolHandler;
    use crate::tools::test_support::RecordingBackend;

    fn setup() -> (Arc<RecordingBackend>, Vec<AnalyticsTool>) {
        let recorder = Arc::new(RecordingBackend::new());
        let backend: Arc<dyn AnalyticsBackend> = recorder.clone();
        (recorder, tools(&backend))
    }

    async fn call(tool: &AnalyticsTool, value: Value) -> (bool, Value) {
        let result = tool.execute(value.as_object().cloned().unwrap()).await.unwrap();
        let payload = serde_json::from_str(result_text(&result).unwrap()).unwrap();
        (result.is_error == Some(true), payload)
    }

    fn report() -> Value {
        json!({
            "date_ranges": [{"start_date": "28daysAgo", "end_date": "yesterday"}],
            "metrics": ["sessions"]
        })
    }

    #[tokio::test]
    async fn test_batch_wraps_each_request() {
        let (recorder, tools) = setup();
        let (is_error, _) = call(
            &tools[0],
            json!({"property_id": "42", "requests": [report(), report()]}),
        )
        .await;
        assert!(!is_error);

        let request = recorder.last_request();
        assert_eq!(request.path, "properties/42:batchRunReports");
        let body = request.body.unwrap();
        let requests = body["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["dateRanges"][0]["startDate"], "28daysAgo");
        assert_eq!(requests[0]["metrics"], json!([{"name": "sessions"}]));
    }

    #[tokio::test]
    async fn test_batch_limit() {
        let (recorder, tools) = setup();
        let requests: Vec<Value> = (0..51).map(|_| report()).collect();
        let (is_error, payload) = call(
            &tools[0],
            json!({"property_id": "42", "requests": requests}),
        )
        .await;

        assert!(is_error);
        assert_eq!(payload["error"], "ValidationError");
        assert_eq!(payload["validRange"], json!([1, 50]));
        assert!(recorder.requests().is_empty());
    }

    #[tokio::test]
    async fn test_pivot_body() {
        let (recorder, tools) = setup();
        let (is_error, _) = call(
            &tools[1],
            json!({
                "property_id": 42,
                "date_ranges": [{"start_date": "2024-01-01", "end_date": "2024-01-31"}],
                "metrics": ["sessions"],
                "dimensions": ["country", "browser"],
                "pivots": [
                    {"field_names": ["country"], "limit": 5},
                    {"field_names": ["browser"], "offset": 1, "limit": 3}
                ]
            }),
        )
        .await;
        assert!(!is_error);

        let body = recorder.last_request().body.unwrap();
        assert_eq!(
            body["pivots"],
            json!([
                {"fieldNames": ["country"], "limit": 5},
                {"fieldNames": ["browser"], "limit": 3, "offset": 1}
            ])
        );
    }

    #[tokio::test]
    async fn test_pivot_requires_field_names() {
        let (_, tools) = setup();
        let (is_error, payload) = call(
            &tools[1],
            json!({
                "property_id": 42,
                "date_ranges": [{"start_date": "today", "end_date": "today"}],
                "metrics": ["sessions"],
                "pivots": [{"limit": 5}]
            }),
        )
        .await;
        assert!(is_error);
        assert_eq!(payload["error"], "ValidationError");
    }

    #[tokio::test]
    async fn test_compatibility_filter_passthrough() {
        let (recorder, tools) = setup();
        call(
            &tools[2],
            json!({
                "property_id": "properties/42",
                "metrics": ["sessions"],
                "compatibility_filter": "COMPATIBLE"
            }),
        )
        .await;

        let request = recorder.last_request();
        assert_eq!(request.path, "properties/42:checkCompatibility");
        assert_eq!(
            request.body.unwrap(),
            json!({"metrics": [{"name": "sessions"}], "compatibilityFilter": "COMPATIBLE"})
        );

        let (is_error, payload) = call(
            &tools[2],
            json!({"property_id": "42", "compatibility_filter": "MAYBE"}),
        )
        .await;
        assert!(is_error);
        assert_eq!(payload["validOptions"], json!(["COMPATIBLE", "INCOMPATIBLE"]));
    }
}
