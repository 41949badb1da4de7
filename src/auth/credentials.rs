//! Application Default Credentials sources.
//!
//! Two file formats are understood, matching what `gcloud` and the Cloud
//! console write: `service_account` keys (exchanged through a signed JWT
//! assertion) and `authorized_user` refresh tokens. The GCE metadata server
//! is the last source in the chain and needs no file at all.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AuthError;
use super::token::{AccessToken, TokenResponse, request_token};

/// Lifetime requested for service account assertions.
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;

/// The metadata server answers quickly or not at all.
const METADATA_TIMEOUT: Duration = Duration::from_secs(3);

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// A `service_account` key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub quota_project_id: Option<String>,
}

/// An `authorized_user` file, as written by `gcloud auth application-default login`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub quota_project_id: Option<String>,
}

/// A parsed ADC credentials file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl CredentialsFile {
    pub fn from_path(path: &Path) -> Result<Self, AuthError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AuthError::InvalidCredentialsFile(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
            .map_err(|e| AuthError::InvalidCredentialsFile(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceAccount(_) => "service_account",
            Self::AuthorizedUser(_) => "authorized_user",
        }
    }

    pub fn quota_project_id(&self) -> Option<&str> {
        match self {
            Self::ServiceAccount(key) => key.quota_project_id.as_deref(),
            Self::AuthorizedUser(user) => user.quota_project_id.as_deref(),
        }
    }

    fn token_uri<'a>(&'a self, default: &'a str) -> &'a str {
        let uri = match self {
            Self::ServiceAccount(key) => key.token_uri.as_deref(),
            Self::AuthorizedUser(user) => user.token_uri.as_deref(),
        };
        uri.unwrap_or(default)
    }

    /// Exchange the file's secret for an access token.
    pub async fn fetch_token(
        &self,
        http: &reqwest::Client,
        default_token_uri: &str,
        scopes: &[String],
    ) -> Result<AccessToken, AuthError> {
        let token_uri = self.token_uri(default_token_uri);
        let response = match self {
            Self::ServiceAccount(key) => {
                let assertion = sign_assertion(key, token_uri, scopes)?;
                request_token(
                    http,
                    token_uri,
                    &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
                )
                .await?
            }
            Self::AuthorizedUser(user) => {
                request_token(
                    http,
                    token_uri,
                    &[
                        ("grant_type", "refresh_token"),
                        ("client_id", user.client_id.as_str()),
                        ("client_secret", user.client_secret.as_str()),
                        ("refresh_token", user.refresh_token.as_str()),
                    ],
                )
                .await?
            }
        };
        Ok(response.into_access_token())
    }
}

fn sign_assertion(
    key: &ServiceAccountKey,
    token_uri: &str,
    scopes: &[String],
) -> Result<String, AuthError> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| AuthError::Signing(e.to_string()))?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let iat = Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: scopes.join(" "),
        aud: token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECONDS,
    };

    encode(&header, &claims, &encoding_key).map_err(|e| AuthError::Signing(e.to_string()))
}

/// Where an ADC token came from, kept so it can be refreshed the same way.
#[derive(Debug, Clone)]
pub enum AdcSource {
    /// A credentials file, either explicit or gcloud's well-known file.
    File {
        path: PathBuf,
        credentials: CredentialsFile,
    },
    /// The GCE metadata server.
    Metadata { host: String },
}

impl AdcSource {
    pub fn describe(&self) -> String {
        match self {
            Self::File { path, credentials } => {
                format!("{} credentials from {}", credentials.kind(), path.display())
            }
            Self::Metadata { host } => format!("metadata server at {}", host),
        }
    }

    pub fn quota_project_id(&self) -> Option<String> {
        match self {
            Self::File { credentials, .. } => credentials.quota_project_id().map(str::to_string),
            Self::Metadata { .. } => None,
        }
    }

    pub async fn fetch_token(
        &self,
        http: &reqwest::Client,
        default_token_uri: &str,
        scopes: &[String],
    ) -> Result<AccessToken, AuthError> {
        match self {
            Self::File { credentials, .. } => {
                credentials.fetch_token(http, default_token_uri, scopes).await
            }
            Self::Metadata { host } => fetch_metadata_token(http, host, scopes).await,
        }
    }
}

async fn fetch_metadata_token(
    http: &reqwest::Client,
    host: &str,
    scopes: &[String],
) -> Result<AccessToken, AuthError> {
    let url = format!(
        "http://{}/computeMetadata/v1/instance/service-accounts/default/token",
        host
    );
    debug!(%url, "Requesting token from metadata server");

    let response = http
        .get(&url)
        .header("Metadata-Flavor", "Google")
        .query(&[("scopes", scopes.join(","))])
        .timeout(METADATA_TIMEOUT)
        .send()
        .await
        .map_err(|e| AuthError::Metadata(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AuthError::Metadata(format!("HTTP {}", response.status())));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::Metadata(format!("Malformed token response: {}", e)))?;
    Ok(body.into_access_token())
}
