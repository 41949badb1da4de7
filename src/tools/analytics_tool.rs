//! The `ToolHandler` used by every Analytics tool.
//!
//! A tool is a name, a description, a schema, the error tag reported when
//! the operation fails, and an async function from arguments to upstream
//! JSON. This type turns that function's outcome into the envelope.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rmcp::model::JsonObject;
use tracing::warn;

use super::args::{ToolError, ToolOutcome};
use super::envelope::{self, ErrorPayload};
use super::registry::{ToolFuture, ToolHandler};
use crate::analytics::{AnalyticsBackend, ApiError};

type RunFuture = Pin<Box<dyn Future<Output = ToolOutcome> + Send>>;
type RunFn = dyn Fn(Arc<dyn AnalyticsBackend>, JsonObject) -> RunFuture + Send + Sync;

const AUTH_SUGGESTION: &str = "Set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET and run \
     'analytics-mcp auth', or configure Application Default Credentials with \
     'gcloud auth application-default login'";

pub struct AnalyticsTool {
    name: &'static str,
    description: &'static str,
    error_tag: &'static str,
    failure_suggestion: Option<&'static str>,
    schema: JsonObject,
    backend: Arc<dyn AnalyticsBackend>,
    run: Box<RunFn>,
}

impl AnalyticsTool {
    pub fn new<F, Fut>(
        backend: &Arc<dyn AnalyticsBackend>,
        name: &'static str,
        description: &'static str,
        error_tag: &'static str,
        schema: JsonObject,
        run: F,
    ) -> Self
    where
        F: Fn(Arc<dyn AnalyticsBackend>, JsonObject) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolOutcome> + Send + 'static,
    {
        Self {
            name,
            description,
            error_tag,
            failure_suggestion: None,
            schema,
            backend: backend.clone(),
            run: Box::new(move |api, args| -> RunFuture { Box::pin(run(api, args)) }),
        }
    }

    /// Extra guidance attached to operation failures.
    pub fn with_failure_suggestion(mut self, suggestion: &'static str) -> Self {
        self.failure_suggestion = Some(suggestion);
        self
    }

    fn failure_payload(&self, error: ToolError) -> ErrorPayload {
        match error {
            ToolError::Validation(payload) => payload,
            ToolError::Api(ApiError::Auth(e)) => {
                ErrorPayload::new("AuthenticationError", e.to_string()).with_suggestion(AUTH_SUGGESTION)
            }
            ToolError::Api(e) => self.operation_payload(e.to_string()),
            ToolError::Failed(msg) => self.operation_payload(msg),
        }
    }

    fn operation_payload(&self, message: String) -> ErrorPayload {
        let payload = ErrorPayload::new(self.error_tag, message);
        match self.failure_suggestion {
            Some(suggestion) => payload.with_suggestion(suggestion),
            None => payload,
        }
    }
}

impl ToolHandler for AnalyticsTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn input_schema(&self) -> JsonObject {
        self.schema.clone()
    }

    fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
        let outcome = (self.run)(self.backend.clone(), args);

        Box::pin(async move {
            match outcome.await {
                Ok(value) => Ok(envelope::success(&value)),
                Err(e) => {
                    warn!(tool = self.name, error = self.error_tag, "{}", e);
                    Ok(self.failure_payload(e).into_result())
                }
            }
        })
    }
}
