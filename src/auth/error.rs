use std::fmt;

/// Errors raised while obtaining or refreshing Google credentials.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Every configured method failed; carries one line per attempt.
    NoCredentials(Vec<String>),
    /// OAuth2 client id/secret are missing.
    OAuthNotConfigured,
    /// OAuth2 is configured but no tokens have been stored yet.
    NoStoredTokens(String),
    /// Stored tokens are expired and carry no refresh token.
    TokenExpired,
    /// Reading or writing the token file failed.
    TokenStore(String),
    /// The token endpoint rejected the request or was unreachable.
    TokenEndpoint(String),
    /// An ADC credentials file was missing or malformed.
    InvalidCredentialsFile(String),
    /// The GCE metadata server could not provide a token.
    Metadata(String),
    /// Signing the service account assertion failed.
    Signing(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials(attempts) => {
                write!(f, "All authentication methods failed")?;
                if !attempts.is_empty() {
                    write!(f, " ({})", attempts.join("; "))?;
                }
                write!(
                    f,
                    ". Configure either: 1. OAuth2: set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET, \
                     then run 'analytics-mcp auth'; 2. ADC: run 'gcloud auth application-default login \
                     --scopes=https://www.googleapis.com/auth/analytics.readonly,https://www.googleapis.com/auth/analytics.edit' \
                     or set GOOGLE_APPLICATION_CREDENTIALS"
                )
            }
            Self::OAuthNotConfigured => {
                write!(f, "OAuth2 requires GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET")
            }
            Self::NoStoredTokens(path) => write!(
                f,
                "No OAuth2 tokens found at {}. Run 'analytics-mcp auth' first",
                path
            ),
            Self::TokenExpired => {
                write!(f, "OAuth2 access token expired and no refresh token is available")
            }
            Self::TokenStore(msg) => write!(f, "Token store error: {}", msg),
            Self::TokenEndpoint(msg) => write!(f, "Token endpoint error: {}", msg),
            Self::InvalidCredentialsFile(msg) => write!(f, "Invalid credentials file: {}", msg),
            Self::Metadata(msg) => write!(f, "Metadata server error: {}", msg),
            Self::Signing(msg) => write!(f, "Failed to sign service account assertion: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}
