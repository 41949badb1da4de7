use std::{env, path::PathBuf};

use tracing::{info, warn};

use crate::auth::{DEFAULT_REDIRECT_URI, GOOGLE_ANALYTICS_SCOPES, GOOGLE_TOKEN_URI};

/// Default GCE metadata server host used as the last ADC fallback.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Authentication inputs consumed by the credential resolver.
///
/// Everything here comes from the process environment (optionally seeded
/// from a `.env` file); see [`AuthConfig::from_env`].
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth2 client id (`GOOGLE_CLIENT_ID`)
    pub client_id: Option<String>,
    /// OAuth2 client secret (`GOOGLE_CLIENT_SECRET`)
    pub client_secret: Option<String>,
    /// Redirect URI registered for the OAuth2 client
    pub redirect_uri: String,
    /// Where OAuth2 tokens are persisted between runs
    pub token_path: PathBuf,
    /// Explicit ADC credentials file (`GOOGLE_APPLICATION_CREDENTIALS`)
    pub application_credentials: Option<PathBuf>,
    /// gcloud configuration directory holding the well-known ADC file
    pub gcloud_config_dir: Option<PathBuf>,
    /// Ambient project id (`GOOGLE_CLOUD_PROJECT` / `GCLOUD_PROJECT`)
    pub project_id: Option<String>,
    /// Host of the GCE metadata server, or `None` to skip it
    pub metadata_host: Option<String>,
    /// OAuth2 token endpoint
    pub token_uri: String,
    /// Scopes requested for every token
    pub scopes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            token_path: default_token_path(),
            application_credentials: None,
            gcloud_config_dir: default_gcloud_config_dir(),
            project_id: None,
            metadata_host: Some(DEFAULT_METADATA_HOST.to_string()),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            scopes: GOOGLE_ANALYTICS_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Which credential inputs are visible at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAvailability {
    /// Client id and secret are both set.
    OAuth2,
    /// No OAuth2 client, but an ADC signal is present.
    ApplicationDefault,
    /// Neither is configured; tools will fail until the environment is fixed.
    Unconfigured,
}

impl AuthConfig {
    /// Build the configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let gcloud_config_dir = non_empty_env("CLOUDSDK_CONFIG")
            .map(PathBuf::from)
            .or(defaults.gcloud_config_dir);

        Self {
            client_id: non_empty_env("GOOGLE_CLIENT_ID"),
            client_secret: non_empty_env("GOOGLE_CLIENT_SECRET"),
            redirect_uri: non_empty_env("GA_MCP_REDIRECT_URI").unwrap_or(defaults.redirect_uri),
            token_path: non_empty_env("GA_MCP_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.token_path),
            application_credentials: non_empty_env("GOOGLE_APPLICATION_CREDENTIALS")
                .map(PathBuf::from),
            gcloud_config_dir,
            project_id: non_empty_env("GOOGLE_CLOUD_PROJECT")
                .or_else(|| non_empty_env("GCLOUD_PROJECT")),
            metadata_host: non_empty_env("GCE_METADATA_HOST").or(defaults.metadata_host),
            token_uri: defaults.token_uri,
            scopes: defaults.scopes,
        }
    }

    pub fn has_oauth_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// True when an explicit credentials path or an ambient project is set.
    pub fn has_adc_signals(&self) -> bool {
        self.application_credentials.is_some() || self.project_id.is_some()
    }

    pub fn availability(&self) -> AuthAvailability {
        if self.has_oauth_credentials() {
            AuthAvailability::OAuth2
        } else if self.has_adc_signals() {
            AuthAvailability::ApplicationDefault
        } else {
            AuthAvailability::Unconfigured
        }
    }

    /// Location of the file written by `gcloud auth application-default login`.
    pub fn well_known_adc_path(&self) -> Option<PathBuf> {
        self.gcloud_config_dir
            .as_ref()
            .map(|dir| dir.join("application_default_credentials.json"))
    }

    /// Log what the server can see at startup.
    ///
    /// The server always starts; credentials are only checked when a tool
    /// first needs the upstream API.
    pub fn log_availability(&self) {
        match self.availability() {
            AuthAvailability::OAuth2 => {
                info!("OAuth2 client credentials detected");
                info!("Run `analytics-mcp auth` if no tokens have been stored yet");
            }
            AuthAvailability::ApplicationDefault => {
                info!("Application Default Credentials signals detected");
            }
            AuthAvailability::Unconfigured => {
                warn!("No authentication method configured. The server will start but tools will fail.");
                info!("Authentication options:");
                info!("  1. OAuth2: set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET, then run `analytics-mcp auth`");
                info!(
                    "  2. ADC: run 'gcloud auth application-default login --scopes={}'",
                    self.scopes.join(",")
                );
                info!("  3. ADC: set GOOGLE_APPLICATION_CREDENTIALS to a service account JSON path");
            }
        }
    }
}

/// Load a `.env` file if present (`DOTENV_PATH` overrides the location).
pub fn load_dotenv() {
    if let Ok(path) = env::var("DOTENV_PATH") {
        dotenvy::from_path(&path).ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("analytics-mcp")
        .join("tokens.json")
}

fn default_gcloud_config_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join("gcloud"))
    } else {
        dirs::home_dir().map(|home| home.join(".config").join("gcloud"))
    }
}
