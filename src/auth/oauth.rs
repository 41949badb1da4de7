//! OAuth2 installed-app flow and on-disk token store.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::token::{AccessToken, TokenResponse, request_token};
use super::AuthError;
use crate::config::AuthConfig;

/// Redirect URI used when `GA_MCP_REDIRECT_URI` is not set.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/oauth2callback";

const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Tokens persisted after a successful authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl StoredTokens {
    fn from_response(response: TokenResponse) -> Self {
        let expiry_date = response.expires_at();
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expiry_date,
            scope: response.scope,
            token_type: response.token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.access_token().is_expired()
    }

    pub fn access_token(&self) -> AccessToken {
        AccessToken::new(self.access_token.clone(), self.expiry_date)
    }

    /// Apply a refresh response; Google omits the refresh token on refresh.
    fn refreshed(&self, response: TokenResponse) -> Self {
        let mut next = Self::from_response(response);
        if next.refresh_token.is_none() {
            next.refresh_token = self.refresh_token.clone();
        }
        next
    }
}

/// OAuth2 client for the installed-app flow.
#[derive(Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_uri: String,
    token_path: PathBuf,
    scopes: Vec<String>,
    http: reqwest::Client,
}

impl OAuthClient {
    /// Build a client when both the id and the secret are configured.
    pub fn from_config(config: &AuthConfig, http: reqwest::Client) -> Option<Self> {
        let (client_id, client_secret) = match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) => (id.clone(), secret.clone()),
            _ => return None,
        };

        Some(Self {
            client_id,
            client_secret,
            redirect_uri: config.redirect_uri.clone(),
            token_uri: config.token_uri.clone(),
            token_path: config.token_path.clone(),
            scopes: config.scopes.clone(),
            http,
        })
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Read stored tokens; `Ok(None)` when nothing has been saved yet.
    pub fn load_tokens(&self) -> Result<Option<StoredTokens>, AuthError> {
        if !self.token_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.token_path)
            .map_err(|e| AuthError::TokenStore(format!("{}: {}", self.token_path.display(), e)))?;
        let tokens = serde_json::from_str(&raw)
            .map_err(|e| AuthError::TokenStore(format!("{}: {}", self.token_path.display(), e)))?;
        Ok(Some(tokens))
    }

    pub fn save_tokens(&self, tokens: &StoredTokens) -> Result<(), AuthError> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AuthError::TokenStore(format!("{}: {}", parent.display(), e)))?;
        }
        let raw = serde_json::to_string_pretty(tokens)
            .map_err(|e| AuthError::TokenStore(e.to_string()))?;
        fs::write(&self.token_path, raw)
            .map_err(|e| AuthError::TokenStore(format!("{}: {}", self.token_path.display(), e)))?;
        restrict_to_owner(&self.token_path)?;
        debug!("Saved OAuth2 tokens to {}", self.token_path.display());
        Ok(())
    }

    /// Delete stored tokens. Returns `true` if a file was removed.
    pub fn clear_tokens(&self) -> Result<bool, AuthError> {
        if !self.token_path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.token_path)
            .map_err(|e| AuthError::TokenStore(format!("{}: {}", self.token_path.display(), e)))?;
        Ok(true)
    }

    /// Stored tokens exist and are either fresh or refreshable.
    pub fn has_valid_tokens(&self) -> bool {
        match self.load_tokens() {
            Ok(Some(tokens)) => !tokens.is_expired() || tokens.refresh_token.is_some(),
            _ => false,
        }
    }

    /// URL the user opens to grant access.
    pub fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
        let url = url::Url::parse_with_params(
            AUTHORIZATION_ENDPOINT,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.scopes.join(" ").as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::TokenEndpoint(format!("Invalid authorization URL: {}", e)))?;
        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<StoredTokens, AuthError> {
        let response = request_token(
            &self.http,
            &self.token_uri,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )
        .await?;
        Ok(StoredTokens::from_response(response))
    }

    /// Refresh an access token using the stored refresh token.
    pub async fn refresh(&self, tokens: &StoredTokens) -> Result<StoredTokens, AuthError> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or(AuthError::TokenExpired)?;

        let response = request_token(
            &self.http,
            &self.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ],
        )
        .await?;
        Ok(tokens.refreshed(response))
    }

    /// Return a usable access token, refreshing and persisting if expired.
    pub async fn ensure_valid_token(&self) -> Result<AccessToken, AuthError> {
        let tokens = self
            .load_tokens()?
            .ok_or_else(|| AuthError::NoStoredTokens(self.token_path.display().to_string()))?;

        if !tokens.is_expired() {
            return Ok(tokens.access_token());
        }

        info!("OAuth2 access token expired, refreshing");
        let refreshed = self.refresh(&tokens).await?;
        if let Err(e) = self.save_tokens(&refreshed) {
            warn!("Failed to persist refreshed OAuth2 tokens: {}", e);
        }
        Ok(refreshed.access_token())
    }
}

/// The token file holds a refresh token, so only the owner may read it.
#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<(), AuthError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| AuthError::TokenStore(format!("{}: {}", path.display(), e)))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<(), AuthError> {
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
struct CallbackState {
    expected_state: String,
    sender: mpsc::Sender<Result<String, String>>,
}

async fn oauth_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let outcome = if let Some(error) = params.error {
        Err(format!("Authorization denied: {}", error))
    } else if params.state.as_deref() != Some(state.expected_state.as_str()) {
        Err("State mismatch in OAuth2 callback".to_string())
    } else if let Some(code) = params.code {
        Ok(code)
    } else {
        Err("OAuth2 callback did not include a code".to_string())
    };

    let page = if outcome.is_ok() {
        "<h1>Authentication successful</h1><p>You can close this window.</p>"
    } else {
        "<h1>Authentication failed</h1><p>Check the terminal for details.</p>"
    };

    // Only the first callback matters; later ones find a full channel.
    let _ = state.sender.try_send(outcome);
    Html(page)
}

/// Run the interactive authorization flow and persist the resulting tokens.
///
/// Listens on the redirect URI's port for Google's callback, so the URI must
/// point at this machine.
pub async fn run_auth_flow(client: &OAuthClient) -> Result<StoredTokens> {
    let redirect = url::Url::parse(client.redirect_uri()).context("Invalid redirect URI")?;
    let port = redirect
        .port_or_known_default()
        .context("Redirect URI has no port")?;
    let path = redirect.path().to_string();

    let expected_state = uuid::Uuid::new_v4().to_string();
    let auth_url = client.authorization_url(&expected_state)?;

    let (sender, mut receiver) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new()
        .route(&path, get(oauth_callback))
        .with_state(CallbackState {
            expected_state,
            sender,
        });

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind OAuth2 callback listener on port {}", port))?;

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
    });

    eprintln!("Open this URL in your browser to authorize access:\n\n{}\n", auth_url);
    info!("Waiting for OAuth2 callback on {}", client.redirect_uri());

    let outcome = receiver.recv().await;
    let _ = shutdown_tx.send(());
    if let Err(e) = server.await {
        warn!("OAuth2 callback server task failed: {}", e);
    }

    let code = match outcome {
        Some(Ok(code)) => code,
        Some(Err(reason)) => anyhow::bail!(reason),
        None => anyhow::bail!("OAuth2 callback server stopped before receiving a code"),
    };

    let tokens = client.exchange_code(&code).await?;
    client.save_tokens(&tokens)?;
    info!("Stored OAuth2 tokens at {}", client.token_path().display());
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_client(dir: &TempDir) -> OAuthClient {
        let config = AuthConfig {
            client_id: Some("client-123".to_string()),
            client_secret: Some("shh".to_string()),
            token_path: dir.path().join("nested").join("tokens.json"),
            ..Default::default()
        };
        OAuthClient::from_config(&config, reqwest::Client::new()).unwrap()
    }

    fn tokens(expiry: Option<DateTime<Utc>>, refresh: Option<&str>) -> StoredTokens {
        StoredTokens {
            access_token: "ya29.access".to_string(),
            refresh_token: refresh.map(|s| s.to_string()),
            expiry_date: expiry,
            scope: None,
            token_type: Some("Bearer".to_string()),
        }
    }

    #[test]
    fn test_from_config_requires_id_and_secret() {
        let config = AuthConfig {
            client_id: Some("client-123".to_string()),
            ..Default::default()
        };
        assert!(OAuthClient::from_config(&config, reqwest::Client::new()).is_none());
    }

    #[test]
    fn test_token_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir);

        assert_eq!(client.load_tokens().unwrap(), None);
        assert!(!client.has_valid_tokens());

        let stored = tokens(Some(Utc::now() + chrono::Duration::hours(1)), Some("1//refresh"));
        client.save_tokens(&stored).unwrap();

        assert_eq!(client.load_tokens().unwrap(), Some(stored));
        assert!(client.has_valid_tokens());

        assert!(client.clear_tokens().unwrap());
        assert!(!client.clear_tokens().unwrap());
        assert_eq!(client.load_tokens().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let client = test_client(&dir);
        client
            .save_tokens(&tokens(None, Some("1//refresh")))
            .unwrap();

        let mode = fs::metadata(client.token_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // Rewriting an existing, wider file tightens it again.
        fs::set_permissions(client.token_path(), fs::Permissions::from_mode(0o644)).unwrap();
        client.save_tokens(&tokens(None, None)).unwrap();
        let mode = fs::metadata(client.token_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_expired_tokens_without_refresh_are_invalid() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir);

        let stale = tokens(Some(Utc::now() - chrono::Duration::hours(1)), None);
        client.save_tokens(&stale).unwrap();
        assert!(stale.is_expired());
        assert!(!client.has_valid_tokens());
    }

    #[test]
    fn test_corrupt_token_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir);
        fs::create_dir_all(client.token_path().parent().unwrap()).unwrap();
        fs::write(client.token_path(), "not json").unwrap();

        assert!(matches!(client.load_tokens(), Err(AuthError::TokenStore(_))));
    }

    #[test]
    fn test_authorization_url_parameters() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir);

        let url = url::Url::parse(&client.authorization_url("state-xyz").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["redirect_uri"], DEFAULT_REDIRECT_URI);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["state"], "state-xyz");
        assert!(params["scope"].contains("analytics.edit"));
    }

    #[test]
    fn test_refresh_keeps_previous_refresh_token() {
        let original = tokens(None, Some("1//keep-me"));
        let response = TokenResponse {
            access_token: "ya29.new".to_string(),
            expires_in: Some(3600),
            refresh_token: None,
            scope: None,
            token_type: Some("Bearer".to_string()),
        };

        let next = original.refreshed(response);
        assert_eq!(next.access_token, "ya29.new");
        assert_eq!(next.refresh_token.as_deref(), Some("1//keep-me"));
        assert!(!next.is_expired());
    }

    #[tokio::test]
    async fn test_ensure_valid_token_without_store() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir);

        let err = client.ensure_valid_token().await.unwrap_err();
        assert!(matches!(err, AuthError::NoStoredTokens(_)));
    }

    #[tokio::test]
    async fn test_ensure_valid_token_uses_fresh_tokens() {
        let dir = TempDir::new().unwrap();
        let client = test_client(&dir);
        client
            .save_tokens(&tokens(Some(Utc::now() + chrono::Duration::hours(1)), None))
            .unwrap();

        let token = client.ensure_valid_token().await.unwrap();
        assert_eq!(token.value, "ya29.access");
    }
}
