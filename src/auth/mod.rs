//! Google credential resolution.
//!
//! Tools need a bearer token for the Analytics APIs. The resolver tries the
//! following methods in order, once per resolution attempt:
//!
//! - **OAuth2**: when `GOOGLE_CLIENT_ID` and `GOOGLE_CLIENT_SECRET` are set and
//!   tokens from `analytics-mcp auth` are stored (refreshed when expired)
//! - **Application Default Credentials**: `GOOGLE_APPLICATION_CREDENTIALS`,
//!   then the gcloud well-known file, then the GCE metadata server
//!
//! Resolution is lazy. The server answers `tools/list` without credentials
//! and only fails the first call that needs the upstream API. Failures are
//! never cached, so fixing the environment takes effect on the next call.
//!
//! ## Usage
//!
//! ```ignore
//! let resolver = CredentialResolver::from_env();
//! let session = resolver.ensure().await?;
//! request.bearer_auth(&session.access_token);
//! ```

mod credentials;
mod error;
mod oauth;
mod resolver;
mod token;

pub use credentials::{AdcSource, AuthorizedUser, CredentialsFile, ServiceAccountKey};
pub use error::AuthError;
pub use oauth::{DEFAULT_REDIRECT_URI, OAuthClient, StoredTokens, run_auth_flow};
pub use resolver::{AuthMethod, AuthorizedSession, CredentialResolver, CredentialSource};
pub use token::{AccessToken, GOOGLE_TOKEN_URI, TOKEN_EXPIRY_SKEW_SECONDS};

/// Scopes requested for read and write access to Analytics.
pub const GOOGLE_ANALYTICS_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/analytics.readonly",
    "https://www.googleapis.com/auth/analytics.edit",
];
