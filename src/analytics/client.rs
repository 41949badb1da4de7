use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{AnalyticsBackend, Api, ApiError, ApiRequest, BackendFuture};
use crate::auth::CredentialResolver;

/// Base URLs for each API surface.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub data: String,
    pub admin: String,
    pub admin_alpha: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            data: "https://analyticsdata.googleapis.com/v1beta".to_string(),
            admin: "https://analyticsadmin.googleapis.com/v1beta".to_string(),
            admin_alpha: "https://analyticsadmin.googleapis.com/v1alpha".to_string(),
        }
    }
}

impl ApiEndpoints {
    /// Point every surface at one host, keeping Google's version prefixes.
    pub fn with_host(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        Self {
            data: format!("{}/v1beta", host),
            admin: format!("{}/v1beta", host),
            admin_alpha: format!("{}/v1alpha", host),
        }
    }

    fn base(&self, api: Api) -> &str {
        match api {
            Api::Data => &self.data,
            Api::Admin => &self.admin,
            Api::AdminAlpha => &self.admin_alpha,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// reqwest-backed client for the Analytics Data and Admin APIs.
pub struct GoogleAnalyticsClient {
    http: reqwest::Client,
    endpoints: ApiEndpoints,
    resolver: Arc<CredentialResolver>,
}

impl GoogleAnalyticsClient {
    pub fn new(resolver: Arc<CredentialResolver>) -> Self {
        Self::with_endpoints(resolver, ApiEndpoints::default())
    }

    pub fn with_endpoints(resolver: Arc<CredentialResolver>, endpoints: ApiEndpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
            resolver,
        }
    }

    pub fn resolver(&self) -> &Arc<CredentialResolver> {
        &self.resolver
    }

    async fn execute(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let session = self.resolver.ensure().await?;

        let url = format!("{}/{}", self.endpoints.base(request.api), request.path);
        debug!(method = %request.method, %url, "Calling Analytics API");

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .bearer_auth(&session.access_token);
        if let Some(project) = &session.quota_project {
            builder = builder.header("x-goog-user-project", project);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                warn!("Analytics API rejected credentials, clearing cached token");
                self.resolver.reset().await;
            }
            return Err(status_error(status, &text));
        }

        if text.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<GoogleErrorBody>(body) {
        Ok(parsed) => ApiError::Status {
            status: status.as_u16(),
            code: parsed.error.status,
            message: parsed.error.message,
        },
        Err(_) => ApiError::Status {
            status: status.as_u16(),
            code: None,
            message: status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string(),
        },
    }
}

impl AnalyticsBackend for GoogleAnalyticsClient {
    fn send(&self, request: ApiRequest) -> BackendFuture<'_> {
        Box::pin(self.execute(request))
    }
}
