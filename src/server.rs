//! MCP server implementation using rmcp.
//!
//! Serves the Analytics tool catalog over stdio or streamable HTTP. Every
//! `tools/call` goes through [`ToolRegistry::dispatch`], so tool failures
//! reach the client as error envelopes rather than protocol errors.

use std::sync::Arc;

use anyhow::{Result, bail};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::{Router, extract::State, response::Json, routing::get};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
};
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::tools::ToolRegistry;

const INSTRUCTIONS: &str = "Google Analytics 4 tools. Use get_account_summaries to find \
     property IDs, get_metadata to discover dimension and metric names, then run_report \
     or the other reporting tools. Property IDs may be given as 123456 or 'properties/123456'.";

/// MCP server that handles protocol requests and delegates to tool handlers.
#[derive(Clone)]
pub struct McpServer {
    tool_registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(tool_registry: Arc<ToolRegistry>) -> Self {
        Self { tool_registry }
    }

    /// Get the tool registry.
    pub fn tool_registry(&self) -> &Arc<ToolRegistry> {
        &self.tool_registry
    }
}

impl ServerHandler for McpServer {
    fn ping(
        &self,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<(), McpError>> + Send + '_ {
        std::future::ready(Ok(()))
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let result = ListToolsResult {
            tools: self.tool_registry.list_tools(),
            next_cursor: None,
            ..Default::default()
        };
        std::future::ready(Ok(result))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        let tool_name = request.name.to_string();
        let args = request.arguments.unwrap_or_default();
        let registry = self.tool_registry.clone();

        async move { Ok(registry.dispatch(&tool_name, args).await) }
    }

    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListPromptsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListPromptsResult {
            prompts: Vec::new(),
            next_cursor: None,
            ..Default::default()
        }))
    }

    fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<GetPromptResult, McpError>> + Send + '_ {
        debug!("Prompt requested: {}", request.name);
        // -32602: Invalid params for an unknown prompt name
        std::future::ready(Err(McpError::invalid_params(
            format!("Unknown prompt: {}", request.name),
            None,
        )))
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

async fn health_check(State(registry): State<Arc<ToolRegistry>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "tools": registry.len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// CORS for browser-based MCP clients.
///
/// `/mcp` is unauthenticated and can run write tools with the user's Google
/// credentials, so only the listed origins get CORS headers. An empty list
/// means no cross-origin browser access at all.
pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let mut origins = Vec::with_capacity(allowed_origins.len());
    for origin in allowed_origins {
        let origin = origin.trim();
        if origin == "*" {
            bail!("Wildcard CORS origin is not allowed; list each origin explicitly");
        }
        origins.push(HeaderValue::from_str(origin)?);
    }

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static("mcp-session-id")]))
}

/// Router serving MCP at `/mcp` and a liveness probe at `/health`.
pub fn http_router(server: Arc<McpServer>, allowed_origins: &[String]) -> Result<Router> {
    let tool_registry = server.tool_registry().clone();

    let service = StreamableHttpService::new(
        {
            let tool_registry = tool_registry.clone();
            move || Ok(McpServer::new(tool_registry.clone()))
        },
        LocalSessionManager::default().into(),
        Default::default(),
    );

    Ok(Router::new()
        .route("/health", get(health_check))
        .with_state(tool_registry)
        .nest_service("/mcp", service)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins)?))
}

/// Serve MCP over streamable HTTP until the listener fails.
pub async fn start_mcp_http(
    server: Arc<McpServer>,
    bind: &str,
    allowed_origins: &[String],
) -> Result<()> {
    let tools = server.tool_registry().len();
    let router = http_router(server, allowed_origins)?;
    let listener = tokio::net::TcpListener::bind(bind).await?;

    info!("MCP HTTP server listening on http://{}/mcp ({} tools)", bind, tools);
    if allowed_origins.is_empty() {
        info!("Cross-origin browser access disabled");
    } else {
        info!("CORS allowed origins: {}", allowed_origins.join(", "));
    }

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ErrorPayload, ToolFuture, ToolHandler};
    use rmcp::model::JsonObject;

    struct Echo;

    impl ToolHandler for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the arguments"
        }

        fn input_schema(&self) -> JsonObject {
            JsonObject::new()
        }

        fn execute(&self, _args: JsonObject) -> ToolFuture<'_> {
            Box::pin(async { Ok(ErrorPayload::new("EchoError", "nothing to echo").into_result()) })
        }
    }

    fn server() -> McpServer {
        McpServer::new(Arc::new(ToolRegistry::new().register_handler(Echo)))
    }

    #[test]
    fn test_info_advertises_tools_and_prompts() {
        let info = server().get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.prompts.is_some());
        assert!(info.capabilities.resources.is_none());
        assert!(info.instructions.unwrap().contains("get_account_summaries"));
    }

    async fn spawn_router(allowed_origins: &[String]) -> String {
        let router = http_router(Arc::new(server()), allowed_origins).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn preflight(base: &str, origin: &str) -> reqwest::Response {
        reqwest::Client::new()
            .request(Method::OPTIONS, format!("{}/mcp", base))
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_foreign_origin_gets_no_cors_headers() {
        let base = spawn_router(&[]).await;
        let response = preflight(&base, "https://evil.example").await;
        assert!(response.headers().get("access-control-allow-origin").is_none());

        let base = spawn_router(&["http://localhost:6274".to_string()]).await;
        let response = preflight(&base, "https://evil.example").await;
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_listed_origin_is_allowed() {
        let base = spawn_router(&["http://localhost:6274".to_string()]).await;
        let response = preflight(&base, "http://localhost:6274").await;
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:6274"
        );
    }

    #[test]
    fn test_wildcard_origin_is_rejected() {
        assert!(cors_layer(&["*".to_string()]).is_err());
        assert!(cors_layer(&["http://localhost:6274".to_string()]).is_ok());
    }

    #[tokio::test]
    async fn test_health_reports_tool_count() {
        let registry = server().tool_registry().clone();
        let Json(body) = health_check(State(registry)).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["tools"], 1);
    }
}
