//! Access tokens and the OAuth2 token endpoint exchange shared by every
//! credential source.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::AuthError;

/// Google's OAuth2 token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as expired.
pub const TOKEN_EXPIRY_SKEW_SECONDS: i64 = 60;

/// Timeout for token endpoint requests.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A bearer token and its expiry, if known.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Whether the token is expired or about to expire.
    ///
    /// Tokens without an expiry never expire from our point of view.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| {
                at.signed_duration_since(Utc::now())
                    <= chrono::Duration::seconds(TOKEN_EXPIRY_SKEW_SECONDS)
            })
            .unwrap_or(false)
    }
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry; a lifetime that does not fit a timestamp counts as none.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
    }

    pub fn into_access_token(self) -> AccessToken {
        let expires_at = self.expires_at();
        AccessToken::new(self.access_token, expires_at)
    }
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// POST a form-encoded grant to a token endpoint.
pub async fn request_token(
    http: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, AuthError> {
    let grant_type = form
        .iter()
        .find(|(k, _)| *k == "grant_type")
        .map(|(_, v)| *v)
        .unwrap_or("unknown");
    debug!(token_uri, grant_type, "Requesting access token");

    let response = http
        .post(token_uri)
        .timeout(TOKEN_REQUEST_TIMEOUT)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::TokenEndpoint(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::TokenEndpoint(e.to_string()))?;

    if !status.is_success() {
        let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(desc) => format!("{}: {}", err.error, desc),
                None => err.error,
            },
            Err(_) => format!("HTTP {}", status),
        };
        return Err(AuthError::TokenEndpoint(detail));
    }

    serde_json::from_str(&body)
        .map_err(|e| AuthError::TokenEndpoint(format!("Malformed token response: {}", e)))
}
