use std::path::PathBuf;

use analytics_mcp::auth::{CredentialResolver, OAuthClient, run_auth_flow};
use analytics_mcp::config::load_dotenv;
use analytics_mcp::{AuthConfig, build_registry, create_server};
use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

// rmcp imports for MCP stdio server mode
use rmcp::service::ServiceExt;
use rmcp::transport::stdio;

#[derive(Parser)]
#[command(name = "analytics-mcp")]
#[command(about = "MCP server exposing the Google Analytics Admin and Data APIs")]
struct Cli {
    /// Where OAuth2 tokens are stored
    #[arg(long, global = true, env = "GA_MCP_TOKEN_PATH")]
    token_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as an MCP stdio server (the default)
    Serve,
    /// Run as an MCP streamable HTTP server
    ServeHttp {
        /// Bind address, e.g. 127.0.0.1:3000
        #[arg(long, env = "GA_MCP_BIND", default_value = "127.0.0.1:3942")]
        bind: String,
        /// Browser origin allowed to call the server (repeatable; none by default)
        #[arg(long = "allowed-origin", env = "GA_MCP_ALLOWED_ORIGINS", value_delimiter = ',')]
        allowed_origins: Vec<String>,
    },
    /// Authorize with Google through the browser and store OAuth2 tokens
    Auth {
        /// Local port for the OAuth2 callback (overrides the redirect URI port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show which authentication methods are configured
    AuthStatus {
        /// Also try to obtain an access token
        #[arg(long, default_value_t = false)]
        check: bool,
    },
    /// Delete stored OAuth2 tokens
    Logout,
    /// List the available tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    // stdout belongs to the stdio transport, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("analytics_mcp=info".parse()?)
                .add_directive("rmcp=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AuthConfig::from_env();
    if let Some(path) = cli.token_path {
        config.token_path = path;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!("Starting MCP stdio server");
            config.log_availability();

            let server = create_server(config)?;

            // Run as an MCP stdio server. McpServer implements ServerHandler.
            let service = server
                .as_ref()
                .clone()
                .serve(stdio())
                .await
                .inspect_err(|e| tracing::error!("serving error: {:?}", e))?;

            // Block until the MCP session ends.
            service.waiting().await?;
            info!("MCP stdio server session ended");
        }
        Commands::ServeHttp {
            bind,
            allowed_origins,
        } => {
            info!("Starting MCP HTTP server on {}", bind);
            config.log_availability();

            let server = create_server(config)?;
            analytics_mcp::server::start_mcp_http(server, &bind, &allowed_origins).await?;
        }
        Commands::Auth { port } => {
            if let Some(port) = port {
                config.redirect_uri = with_port(&config.redirect_uri, port)?;
            }
            let Some(client) = OAuthClient::from_config(&config, reqwest::Client::new()) else {
                bail!("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set to run the OAuth2 flow");
            };

            let tokens = run_auth_flow(&client).await?;
            println!("Authorization complete.");
            println!("  Tokens:  {}", client.token_path().display());
            if let Some(expiry) = tokens.expiry_date {
                println!("  Expires: {}", expiry.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if tokens.refresh_token.is_none() {
                println!("  Warning: no refresh token was issued; run `analytics-mcp auth` again when it expires.");
            }
        }
        Commands::AuthStatus { check } => {
            print_auth_status(config, check).await;
        }
        Commands::Logout => {
            let Some(client) = OAuthClient::from_config(&config, reqwest::Client::new()) else {
                bail!("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET are not set; nothing to log out of");
            };
            if client.clear_tokens()? {
                println!("Removed stored tokens at {}", client.token_path().display());
            } else {
                println!("No stored tokens at {}", client.token_path().display());
            }
        }
        Commands::Tools => {
            let registry = build_registry(config);
            for name in registry.list_names() {
                if let Some(tool) = registry.get(&name) {
                    println!("{:<40} {}", tool.name(), tool.description());
                }
            }
            println!();
            println!("{} tools", registry.len());
        }
    }

    Ok(())
}

/// Replace the port of a redirect URI.
fn with_port(redirect_uri: &str, port: u16) -> Result<String> {
    let mut url = url::Url::parse(redirect_uri)?;
    if url.set_port(Some(port)).is_err() {
        bail!("Cannot set a port on redirect URI {}", redirect_uri);
    }
    Ok(url.to_string())
}

async fn print_auth_status(config: AuthConfig, check: bool) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    println!("OAuth2");
    println!("  Client configured: {}", yes_no(config.has_oauth_credentials()));
    println!("  Token file:        {}", config.token_path.display());
    if let Some(client) = OAuthClient::from_config(&config, reqwest::Client::new()) {
        match client.load_tokens() {
            Ok(Some(tokens)) => {
                let state = if tokens.is_expired() { "expired" } else { "valid" };
                println!("  Stored tokens:     {}", state);
                println!("  Refresh token:     {}", yes_no(tokens.refresh_token.is_some()));
                println!("  Usable:            {}", yes_no(client.has_valid_tokens()));
            }
            Ok(None) => println!("  Stored tokens:     none (run `analytics-mcp auth`)"),
            Err(e) => println!("  Stored tokens:     unreadable ({})", e),
        }
    }

    println!("Application Default Credentials");
    match &config.application_credentials {
        Some(path) => println!("  GOOGLE_APPLICATION_CREDENTIALS: {}", path.display()),
        None => println!("  GOOGLE_APPLICATION_CREDENTIALS: not set"),
    }
    if let Some(path) = config.well_known_adc_path() {
        println!("  gcloud ADC file:  {} (exists: {})", path.display(), yes_no(path.exists()));
    }
    println!("  Project:          {}", config.project_id.as_deref().unwrap_or("not set"));
    println!("  Metadata server:  {}", config.metadata_host.as_deref().unwrap_or("disabled"));

    if check {
        let resolver = CredentialResolver::new(config);
        match resolver.ensure().await {
            Ok(session) => println!("\nCredentials OK via {}", session.method),
            Err(e) => println!("\nCredential check failed: {}", e),
        }
    }
}
