//! Dimension and metric metadata.

use std::sync::Arc;

use rmcp::model::JsonObject;

use super::analytics_tool::AnalyticsTool;
use super::args::{ToolOutcome, property_name};
use super::resource::send;
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

async fn get_metadata(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;
    send(&backend, ApiRequest::get(Api::Data, format!("{}/metadata", property))).await
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![AnalyticsTool::new(
        backend,
        "get_metadata",
        "List the dimensions and metrics available to reports on a property, \
         including custom definitions.",
        "MetadataError",
        schema::property_only(),
        get_metadata,
    )]
}
