//! Tool registry for managing MCP tool handlers.
//!
//! Provides a `ToolHandler` trait for implementing tools and a `ToolRegistry`
//! that registers them in order and dispatches calls by name. Dispatch always
//! produces a result envelope; handler errors and panics never escape it.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use rmcp::model::{CallToolResult, JsonObject, Tool as McpTool};
use tracing::{error, info, warn};

use super::envelope::ErrorPayload;

/// Boxed future returned by [`ToolHandler::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<CallToolResult>> + Send + 'a>>;

/// Trait for handling MCP tool invocations.
///
/// Each tool implements this trait to define its schema and execution logic.
pub trait ToolHandler: Send + Sync {
    /// Returns the tool's name (e.g., "run_report").
    fn name(&self) -> &str;

    /// Returns the tool's human-readable title.
    fn title(&self) -> Option<&str> {
        None
    }

    /// Returns the tool's description.
    fn description(&self) -> &str;

    /// Returns the input schema for this tool.
    ///
    /// The schema documents the arguments for callers; dispatch does not
    /// enforce it.
    fn input_schema(&self) -> JsonObject;

    /// Returns the output schema for this tool (optional).
    fn output_schema(&self) -> Option<JsonObject> {
        None
    }

    /// Executes the tool with the given arguments.
    ///
    /// Expected failures should come back as an error envelope in `Ok`.
    /// `Err` is reserved for bugs and is converted by the dispatcher.
    fn execute(&self, args: JsonObject) -> ToolFuture<'_>;

    /// Converts this handler to an `McpTool` for use in `list_tools`.
    fn to_mcp_tool(&self) -> McpTool {
        use std::borrow::Cow;

        McpTool {
            name: Cow::Owned(self.name().to_string()),
            title: self.title().map(|s| s.to_string()),
            description: Some(Cow::Owned(self.description().to_string())),
            input_schema: Arc::new(self.input_schema()),
            output_schema: self.output_schema().map(Arc::new),
            annotations: None,
            icons: None,
            meta: None,
        }
    }
}

/// Ordered registry of tool handlers.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: Vec<Arc<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool handler.
    ///
    /// # Panics
    ///
    /// Panics if a handler with the same name is already registered.
    pub fn register(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        let name = handler.name().to_string();
        assert!(
            !self.index.contains_key(&name),
            "duplicate tool name registered: {}",
            name
        );
        self.index.insert(name, self.handlers.len());
        self.handlers.push(handler);
        self
    }

    /// Register a tool handler from a type that implements `ToolHandler`.
    pub fn register_handler<T: ToolHandler + 'static>(self, handler: T) -> Self {
        self.register(Arc::new(handler))
    }

    /// Get a tool handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.index.get(name).map(|&i| self.handlers[i].clone())
    }

    /// List all registered tool names in registration order.
    pub fn list_names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }

    /// Get all registered tools as `McpTool` instances for `list_tools`.
    pub fn list_tools(&self) -> Vec<McpTool> {
        self.handlers
            .iter()
            .map(|handler| handler.to_mcp_tool())
            .collect()
    }

    /// Check if a tool with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Return the number of registered tools.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Return `true` if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Execute a tool by name, always returning an envelope.
    pub async fn dispatch(&self, name: &str, args: JsonObject) -> CallToolResult {
        let Some(handler) = self.get(name) else {
            warn!("Unknown tool: {}", name);
            return ErrorPayload::new("UnknownTool", format!("Unknown tool: {}", name))
                .with_suggestion(format!("Available tools: {}", self.list_names().join(", ")))
                .into_result();
        };

        info!(tool = name, "Calling tool");

        // A spawned task turns a panicking handler into a JoinError.
        let task = tokio::spawn(async move { handler.execute(args).await });

        let failure = match task.await {
            Ok(Ok(result)) => {
                if result.is_error == Some(true) {
                    warn!(tool = name, "Tool returned an error result");
                } else {
                    info!(tool = name, "Tool completed successfully");
                }
                return result;
            }
            Ok(Err(e)) => e.to_string(),
            Err(join_error) if join_error.is_panic() => panic_message(join_error.into_panic()),
            Err(join_error) => join_error.to_string(),
        };

        error!(tool = name, "Tool failed: {}", failure);
        ErrorPayload::new("ToolExecutionError", format!("Tool execution failed: {}", failure))
            .with_suggestion("Check the tool parameters and try again")
            .into_result()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::envelope::{result_text, success};
    use serde_json::{Value, json};

    enum Behavior {
        Succeed,
        ReturnErrorEnvelope,
        Fail,
        Panic,
    }

    struct TestTool {
        name: &'static str,
        behavior: Behavior,
    }

    impl ToolHandler for TestTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Test tool"
        }

        fn input_schema(&self) -> JsonObject {
            let mut schema = JsonObject::new();
            schema.insert("type".to_string(), json!("object"));
            schema
        }

        fn execute(&self, args: JsonObject) -> ToolFuture<'_> {
            Box::pin(async move {
                match self.behavior {
                    Behavior::Succeed => Ok(success(&Value::Object(args))),
                    Behavior::ReturnErrorEnvelope => {
                        Ok(ErrorPayload::new("ReportError", "quota exceeded").into_result())
                    }
                    Behavior::Fail => Err(anyhow::anyhow!("connection reset")),
                    Behavior::Panic => panic!("handler blew up"),
                }
            })
        }
    }

    fn tool(name: &'static str, behavior: Behavior) -> TestTool {
        TestTool { name, behavior }
    }

    fn payload(result: &CallToolResult) -> Value {
        serde_json::from_str(result_text(result).unwrap()).unwrap()
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .register_handler(tool("echo", Behavior::Succeed))
            .register_handler(tool("report", Behavior::ReturnErrorEnvelope))
            .register_handler(tool("flaky", Behavior::Fail))
            .register_handler(tool("explode", Behavior::Panic))
    }

    #[test]
    fn test_registration_order_is_kept() {
        let registry = registry();
        assert_eq!(registry.len(), 4);
        assert!(!registry.is_empty());
        assert_eq!(registry.list_names(), vec!["echo", "report", "flaky", "explode"]);
        assert!(registry.contains("flaky"));
        assert!(registry.get("missing").is_none());

        let tools = registry.list_tools();
        assert_eq!(tools[0].name, "echo");
        assert_eq!(tools[0].description.as_deref(), Some("Test tool"));
    }

    #[test]
    #[should_panic(expected = "duplicate tool name registered: echo")]
    fn test_duplicate_names_panic() {
        let _ = ToolRegistry::new()
            .register_handler(tool("echo", Behavior::Succeed))
            .register_handler(tool("echo", Behavior::Fail));
    }

    #[tokio::test]
    async fn test_dispatch_success_is_unchanged() {
        let mut args = JsonObject::new();
        args.insert("x".to_string(), json!(1));

        let result = registry().dispatch("echo", args).await;
        assert_eq!(result.is_error, Some(false));
        assert_eq!(payload(&result), json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_dispatch_passes_error_envelopes_through() {
        let result = registry().dispatch("report", JsonObject::new()).await;
        assert_eq!(result.is_error, Some(true));
        assert_eq!(payload(&result)["error"], "ReportError");
    }

    #[tokio::test]
    async fn test_unknown_tool_lists_each_name_once() {
        let registry = registry();
        let result = registry.dispatch("nope", JsonObject::new()).await;
        assert_eq!(result.is_error, Some(true));

        let value = payload(&result);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "UnknownTool");
        assert_eq!(value["message"], "Unknown tool: nope");

        let suggestion = value["suggestion"].as_str().unwrap();
        for name in registry.list_names() {
            assert_eq!(suggestion.matches(name.as_str()).count(), 1, "{}", name);
        }
        assert_eq!(suggestion, "Available tools: echo, report, flaky, explode");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_execution_error() {
        let result = registry().dispatch("flaky", JsonObject::new()).await;
        assert_eq!(result.is_error, Some(true));

        let value = payload(&result);
        assert_eq!(value["error"], "ToolExecutionError");
        assert_eq!(value["message"], "Tool execution failed: connection reset");
        assert_eq!(value["suggestion"], "Check the tool parameters and try again");
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_execution_error() {
        let result = registry().dispatch("explode", JsonObject::new()).await;
        assert_eq!(result.is_error, Some(true));

        let value = payload(&result);
        assert_eq!(value["error"], "ToolExecutionError");
        assert_eq!(value["message"], "Tool execution failed: handler blew up");
    }
}
