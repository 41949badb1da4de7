// Core modules
pub mod analytics;
pub mod auth;
pub mod config;
pub mod tools;

pub mod server;

// Re-export key types and functions
pub use analytics::{AnalyticsBackend, ApiEndpoints, GoogleAnalyticsClient};
pub use auth::{AuthError, CredentialResolver};
pub use config::AuthConfig;
pub use server::McpServer;
pub use tools::{ToolHandler, ToolRegistry, register_all};

use std::sync::Arc;

use anyhow::Result;

/// Build the tool registry backed by the live Google APIs.
pub fn build_registry(config: AuthConfig) -> ToolRegistry {
    let resolver = Arc::new(CredentialResolver::new(config));
    let backend: Arc<dyn AnalyticsBackend> = Arc::new(GoogleAnalyticsClient::new(resolver));
    register_all(backend)
}

/// Convenience function to create a fully configured MCP server.
///
/// Credentials are not resolved here; the first tool call that needs the
/// upstream API triggers resolution.
pub fn create_server(config: AuthConfig) -> Result<Arc<McpServer>> {
    let tool_registry = Arc::new(build_registry(config));
    tracing::debug!("Registered {} tools", tool_registry.len());
    Ok(Arc::new(McpServer::new(tool_registry)))
}
