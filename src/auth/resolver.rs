use std::fmt;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::credentials::{AdcSource, CredentialsFile};
use super::oauth::OAuthClient;
use super::token::AccessToken;
use super::AuthError;
use crate::config::AuthConfig;

/// Which method produced the active credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    OAuth2,
    ApplicationDefault,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OAuth2 => write!(f, "OAuth2"),
            Self::ApplicationDefault => write!(f, "Application Default Credentials"),
        }
    }
}

/// What a caller needs to authorize one upstream request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedSession {
    pub method: AuthMethod,
    pub access_token: String,
    /// Sent as `x-goog-user-project` when present.
    pub quota_project: Option<String>,
}

/// The source a cached token is refreshed from.
#[derive(Clone)]
pub enum CredentialSource {
    OAuth2(OAuthClient),
    ApplicationDefault(AdcSource),
}

impl CredentialSource {
    fn method(&self) -> AuthMethod {
        match self {
            Self::OAuth2(_) => AuthMethod::OAuth2,
            Self::ApplicationDefault(_) => AuthMethod::ApplicationDefault,
        }
    }
}

#[derive(Clone)]
struct CachedCredentials {
    source: CredentialSource,
    token: AccessToken,
    quota_project: Option<String>,
}

impl CachedCredentials {
    fn session(&self) -> AuthorizedSession {
        AuthorizedSession {
            method: self.source.method(),
            access_token: self.token.value.clone(),
            quota_project: self.quota_project.clone(),
        }
    }
}

/// Lazily resolves and caches Google credentials, OAuth2 first.
pub struct CredentialResolver {
    config: AuthConfig,
    http: reqwest::Client,
    oauth: Option<OAuthClient>,
    cache: RwLock<Option<CachedCredentials>>,
}

impl CredentialResolver {
    pub fn new(config: AuthConfig) -> Self {
        let http = reqwest::Client::new();
        let oauth = OAuthClient::from_config(&config, http.clone());
        Self {
            config,
            http,
            oauth,
            cache: RwLock::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(AuthConfig::from_env())
    }

    /// The OAuth2 client, when client id and secret are configured.
    pub fn oauth_client(&self) -> Option<&OAuthClient> {
        self.oauth.as_ref()
    }

    /// Method behind the cached credentials, if any.
    pub async fn active_method(&self) -> Option<AuthMethod> {
        self.cache
            .read()
            .await
            .as_ref()
            .map(|cached| cached.source.method())
    }

    /// Drop cached credentials so the next call resolves from scratch.
    pub async fn reset(&self) {
        *self.cache.write().await = None;
    }

    /// Return a valid session, resolving or refreshing as needed.
    ///
    /// The cache lock is never held across network calls. Two cold callers
    /// may both resolve; the later write wins.
    pub async fn ensure(&self) -> Result<AuthorizedSession, AuthError> {
        let cached = self.cache.read().await.clone();

        let fresh = match cached {
            Some(cached) if !cached.token.is_expired() => return Ok(cached.session()),
            Some(cached) => {
                debug!(method = %cached.source.method(), "Cached access token expired, refreshing");
                match self.refresh(&cached.source).await {
                    Ok(token) => CachedCredentials { token, ..cached },
                    Err(e) => {
                        warn!("Failed to refresh {} token: {}", cached.source.method(), e);
                        self.reset().await;
                        return Err(e);
                    }
                }
            }
            None => self.resolve().await?,
        };

        let session = fresh.session();
        *self.cache.write().await = Some(fresh);
        Ok(session)
    }

    async fn refresh(&self, source: &CredentialSource) -> Result<AccessToken, AuthError> {
        match source {
            CredentialSource::OAuth2(client) => client.ensure_valid_token().await,
            CredentialSource::ApplicationDefault(adc) => {
                adc.fetch_token(&self.http, &self.config.token_uri, &self.config.scopes)
                    .await
            }
        }
    }

    async fn resolve(&self) -> Result<CachedCredentials, AuthError> {
        let mut attempts = Vec::new();

        if let Some(client) = &self.oauth {
            match client.ensure_valid_token().await {
                Ok(token) => {
                    info!("Authenticated with OAuth2");
                    return Ok(CachedCredentials {
                        source: CredentialSource::OAuth2(client.clone()),
                        token,
                        quota_project: self.config.project_id.clone(),
                    });
                }
                Err(e) => {
                    warn!("OAuth2 authentication failed, falling back to ADC: {}", e);
                    attempts.push(format!("OAuth2: {}", e));
                }
            }
        }

        match self.resolve_adc(&mut attempts).await {
            Some((source, token)) => {
                info!("Authenticated with Application Default Credentials ({})", source.describe());
                let quota_project = source
                    .quota_project_id()
                    .or_else(|| self.config.project_id.clone());
                Ok(CachedCredentials {
                    source: CredentialSource::ApplicationDefault(source),
                    token,
                    quota_project,
                })
            }
            None => {
                warn!("No Google credentials available");
                Err(AuthError::NoCredentials(attempts))
            }
        }
    }

    /// Walk the ADC chain, recording one line per failed source.
    async fn resolve_adc(&self, attempts: &mut Vec<String>) -> Option<(AdcSource, AccessToken)> {
        // An explicit path that cannot be used ends the chain.
        if let Some(path) = &self.config.application_credentials {
            return match self.try_file(path).await {
                Ok(found) => Some(found),
                Err(e) => {
                    attempts.push(format!("GOOGLE_APPLICATION_CREDENTIALS: {}", e));
                    None
                }
            };
        }

        if let Some(path) = self.config.well_known_adc_path() {
            if path.exists() {
                match self.try_file(&path).await {
                    Ok(found) => return Some(found),
                    Err(e) => attempts.push(format!("gcloud credentials: {}", e)),
                }
            } else {
                debug!("No gcloud credentials at {}", path.display());
            }
        }

        if let Some(host) = &self.config.metadata_host {
            let source = AdcSource::Metadata { host: host.clone() };
            match source
                .fetch_token(&self.http, &self.config.token_uri, &self.config.scopes)
                .await
            {
                Ok(token) => return Some((source, token)),
                Err(e) => attempts.push(format!("ADC: {}", e)),
            }
        }

        if attempts.is_empty() {
            attempts.push("ADC: no credentials found".to_string());
        }
        None
    }

    async fn try_file(
        &self,
        path: &std::path::Path,
    ) -> Result<(AdcSource, AccessToken), AuthError> {
        let credentials = CredentialsFile::from_path(path)?;
        let source = AdcSource::File {
            path: path.to_path_buf(),
            credentials,
        };
        let token = source
            .fetch_token(&self.http, &self.config.token_uri, &self.config.scopes)
            .await?;
        Ok((source, token))
    }
}
