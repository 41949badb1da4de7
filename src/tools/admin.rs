//! Account and property discovery through the Admin API.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Value, json};

use super::analytics_tool::AnalyticsTool;
use super::args::{ToolOutcome, optional_value, property_name, required_id};
use super::resource::{list, send};
use super::schema;
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

async fn get_account_summaries(backend: Arc<dyn AnalyticsBackend>, _args: JsonObject) -> ToolOutcome {
    send(&backend, ApiRequest::get(Api::Admin, "accountSummaries")).await
}

async fn list_accounts(backend: Arc<dyn AnalyticsBackend>, _args: JsonObject) -> ToolOutcome {
    send(&backend, ApiRequest::get(Api::Admin, "accounts")).await
}

async fn list_properties(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let account = required_id(&args, "account_id")?;
    let account = account.strip_prefix("accounts/").unwrap_or(&account);

    let mut request = ApiRequest::get(Api::Admin, "properties")
        .query("filter", format!("parent:accounts/{}", account));
    if optional_value(&args, "show_deleted").and_then(Value::as_bool) == Some(true) {
        request = request.query("showDeleted", "true");
    }
    send(&backend, request).await
}

async fn get_property_details(backend: Arc<dyn AnalyticsBackend>, args: JsonObject) -> ToolOutcome {
    let property = property_name(&args)?;
    send(&backend, ApiRequest::get(Api::Admin, property)).await
}

async fn get_custom_dimensions_and_metrics(
    backend: Arc<dyn AnalyticsBackend>,
    args: JsonObject,
) -> ToolOutcome {
    let property = property_name(&args)?;
    let dimensions = backend
        .send(ApiRequest::get(Api::Admin, format!("{}/customDimensions", property)))
        .await?;
    let metrics = backend
        .send(ApiRequest::get(Api::Admin, format!("{}/customMetrics", property)))
        .await?;

    let field = |page: &Value, key: &str| page.get(key).cloned().unwrap_or_else(|| json!([]));
    Ok(json!({
        "customDimensions": field(&dimensions, "customDimensions"),
        "customMetrics": field(&metrics, "customMetrics"),
    }))
}

pub fn tools(backend: &Arc<dyn AnalyticsBackend>) -> Vec<AnalyticsTool> {
    vec![
        AnalyticsTool::new(
            backend,
            "get_account_summaries",
            "List every Google Analytics account and property the credentials can access.",
            "AccountSummariesError",
            schema::object(json!({}), &[]),
            get_account_summaries,
        ),
        AnalyticsTool::new(
            backend,
            "list_accounts",
            "List the Google Analytics accounts the credentials can access.",
            "ListAccountsError",
            schema::object(json!({}), &[]),
            list_accounts,
        ),
        AnalyticsTool::new(
            backend,
            "list_properties",
            "List the properties that belong to an account.",
            "ListPropertiesError",
            schema::object(
                json!({
                    "account_id": schema::id("Account ID, as a number or 'accounts/NUMBER'"),
                    "show_deleted": {
                        "type": "boolean",
                        "description": "Include properties in the trash",
                    },
                }),
                &["account_id"],
            ),
            list_properties,
        ),
        AnalyticsTool::new(
            backend,
            "get_property_details",
            "Get the configuration of a property: name, time zone, currency and industry.",
            "PropertyDetailsError",
            schema::property_only(),
            get_property_details,
        ),
        AnalyticsTool::new(
            backend,
            "get_custom_dimensions_and_metrics",
            "List the custom dimensions and custom metrics defined on a property.",
            "CustomDefinitionsError",
            schema::property_only(),
            get_custom_dimensions_and_metrics,
        ),
        AnalyticsTool::new(
            backend,
            "list_google_ads_links",
            "List the Google Ads accounts linked to a property.",
            "GoogleAdsLinksError",
            schema::property_only(),
            |backend, args| list(backend, args, Api::Admin, "googleAdsLinks"),
        ),
    ]
}
