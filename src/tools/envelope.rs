//! The result envelope every tool call returns.
//!
//! Success carries the upstream JSON, pretty-printed, in a single text item.
//! Failure carries an [`ErrorPayload`] the same way with `is_error` set.

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::Value;

/// Structured error body carried inside a failing result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub success: bool,
    /// Machine-readable category tag, e.g. `ValidationError`.
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provided: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_range: Option<[u64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_options: Option<Vec<String>>,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
            suggestion: None,
            provided: None,
            expected: None,
            valid_range: None,
            valid_options: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_provided(mut self, provided: Value) -> Self {
        self.provided = Some(provided);
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_valid_range(mut self, min: u64, max: u64) -> Self {
        self.valid_range = Some([min, max]);
        self
    }

    pub fn with_valid_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// A `ValidationError` for one argument.
    pub fn validation(param: &str, provided: Value, expected: impl Into<String>) -> Self {
        let expected = expected.into();
        Self::new(
            "ValidationError",
            format!("Invalid value for '{}': {}. {}", param, provided, expected),
        )
        .with_suggestion(format!("Please provide a valid value for '{}'", param))
        .with_provided(provided)
        .with_expected(expected)
    }

    pub fn into_result(self) -> CallToolResult {
        let text = serde_json::to_string_pretty(&self)
            .unwrap_or_else(|_| "internal serialization error".to_string());
        text_result(text, true)
    }
}

/// Wrap an upstream response into a successful result.
pub fn success(value: &Value) -> CallToolResult {
    let text = serde_json::to_string_pretty(value)
        .unwrap_or_else(|_| "internal serialization error".to_string());
    text_result(text, false)
}

fn text_result(text: String, is_error: bool) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: None,
        is_error: Some(is_error),
        meta: None,
    }
}

/// Text of the first content item, if it is text.
pub fn result_text(result: &CallToolResult) -> Option<&str> {
    result
        .content
        .first()
        .and_then(|content| content.raw.as_text())
        .map(|text| text.text.as_str())
}
