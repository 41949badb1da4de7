//! In-memory backend for handler tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use reqwest::Method;
use serde_json::{Value, json};

use super::analytics_tool::AnalyticsTool;
use super::envelope::result_text;
use super::registry::ToolHandler;
use crate::analytics::{AnalyticsBackend, ApiError, ApiRequest, BackendFuture};

/// Records every request and answers from canned responses.
///
/// Requests without a canned response get `{}`.
#[derive(Default)]
pub struct RecordingBackend {
    requests: Mutex<Vec<ApiRequest>>,
    responses: Mutex<HashMap<(Method, String), VecDeque<Result<Value, ApiError>>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for `method path`.
    pub fn respond(self, method: Method, path: &str, value: Value) -> Self {
        self.enqueue(method, path, Ok(value))
    }

    /// Queue a failure for `method path`.
    pub fn fail(self, method: Method, path: &str, error: ApiError) -> Self {
        self.enqueue(method, path, Err(error))
    }

    fn enqueue(self, method: Method, path: &str, outcome: Result<Value, ApiError>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

impl AnalyticsBackend for RecordingBackend {
    fn send(&self, request: ApiRequest) -> BackendFuture<'_> {
        let key = (request.method.clone(), request.path.clone());
        self.requests.lock().unwrap().push(request);

        let outcome = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Ok(json!({})));

        Box::pin(async move { outcome })
    }
}

/// Run the named tool and return `(is_error, payload)`.
pub async fn call(tools: &[AnalyticsTool], name: &str, args: Value) -> (bool, Value) {
    let tool = tools
        .iter()
        .find(|t| t.name() == name)
        .unwrap_or_else(|| panic!("no tool named {}", name));
    let args = args.as_object().cloned().expect("arguments must be an object");
    let result = tool.execute(args).await.unwrap();
    let payload = serde_json::from_str(result_text(&result).unwrap()).unwrap();
    (result.is_error == Some(true), payload)
}
