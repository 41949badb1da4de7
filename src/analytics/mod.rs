//! Upstream Google Analytics API access.
//!
//! Tool handlers describe each call as an [`ApiRequest`] and hand it to an
//! [`AnalyticsBackend`]. The production backend is [`GoogleAnalyticsClient`];
//! tests substitute a recording backend.

mod client;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use reqwest::Method;
use serde_json::Value;

use crate::auth::AuthError;

pub use client::{ApiEndpoints, GoogleAnalyticsClient};

/// Which Google API surface a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    /// Analytics Data API v1beta
    Data,
    /// Analytics Admin API v1beta
    Admin,
    /// Analytics Admin API v1alpha
    AdminAlpha,
}

/// One upstream API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub api: Api,
    pub method: Method,
    /// Resource path relative to the API version root, e.g.
    /// `properties/123:runReport`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(api: Api, method: Method, path: impl Into<String>) -> Self {
        Self {
            api,
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(api: Api, path: impl Into<String>) -> Self {
        Self::new(api, Method::GET, path)
    }

    pub fn delete(api: Api, path: impl Into<String>) -> Self {
        Self::new(api, Method::DELETE, path)
    }

    pub fn post(api: Api, path: impl Into<String>, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(api, Method::POST, path)
        }
    }

    pub fn patch(api: Api, path: impl Into<String>, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(api, Method::PATCH, path)
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Look up a query parameter by key.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Errors from an upstream call.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// No credentials could be obtained for the call.
    Auth(AuthError),
    /// The API answered with a non-success status.
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// The request never completed.
    Transport(String),
    /// The response body was not the JSON we expected.
    Decode(String),
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(e) => write!(f, "{}", e),
            Self::Status {
                status,
                code: Some(code),
                message,
            } => write!(f, "{} (HTTP {} {})", message, status, code),
            Self::Status {
                status, message, ..
            } => write!(f, "{} (HTTP {})", message, status),
            Self::Transport(msg) => write!(f, "Request failed: {}", msg),
            Self::Decode(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

/// Boxed future returned by [`AnalyticsBackend::send`].
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ApiError>> + Send + 'a>>;

/// Something that can execute upstream requests.
pub trait AnalyticsBackend: Send + Sync {
    fn send(&self, request: ApiRequest) -> BackendFuture<'_>;
}
