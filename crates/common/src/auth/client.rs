//! OAuth 2.0 client implementation with PKCE support
//!
//! Handles the public-client flow against the accounts service:
//! - Authorize URL building
//! - Authorization code exchange (`authorization_code` grant)
//! - Token refresh (`refresh_token` grant)
//!
//! Requests are sent once. Authorization codes are single-use, so a failed
//! exchange is reported rather than retried.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, warn};

use super::pkce::PKCEChallenge;
use super::traits::TokenExchanger;
use super::types::{OAuthConfig, OAuthError, TokenGrant, TokenResponse};

/// Error type for OAuth client operations
#[derive(Debug)]
pub enum OAuthClientError {
    /// HTTP request failed before a response arrived
    RequestFailed(reqwest::Error),

    /// Token endpoint answered with a non-success status
    TokenEndpoint { status: u16, error: Option<OAuthError> },

    /// Provider rejected the redirect URI (configuration bug)
    RedirectMismatch(String),

    /// Failed to parse response
    ParseError(String),

    /// No refresh token available
    NoRefreshToken,

    /// Invalid configuration
    ConfigError(String),
}

impl OAuthClientError {
    /// HTTP status reported by the token endpoint, if one was received
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TokenEndpoint { status, .. } => Some(*status),
            Self::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl std::fmt::Display for OAuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::TokenEndpoint { status, error: Some(e) } => {
                write!(f, "Token endpoint returned HTTP {status}: {e}")
            }
            Self::TokenEndpoint { status, error: None } => {
                write!(f, "Token endpoint returned HTTP {status}")
            }
            Self::RedirectMismatch(msg) => write!(f, "Redirect URI mismatch: {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for OAuthClientError {}

impl From<reqwest::Error> for OAuthClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

/// OAuth 2.0 public client with PKCE
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
}

impl OAuthClient {
    /// Create a client with a default HTTP stack (30s timeout)
    ///
    /// `CLEANPLAYER_DISABLE_PROXY` bypasses system proxies.
    ///
    /// # Examples
    /// ```
    /// use cleanplayer_common::auth::{OAuthClient, OAuthConfig};
    ///
    /// let config = OAuthConfig::new(
    ///     "https://accounts.spotify.com".to_string(),
    ///     "client_id".to_string(),
    ///     "http://localhost:5173/test/".to_string(),
    ///     vec!["streaming".to_string()],
    /// );
    /// let client = OAuthClient::new(config);
    /// assert_eq!(client.redirect_uri(), "http://localhost:5173/test/");
    /// ```
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        let builder = Client::builder().timeout(std::time::Duration::from_secs(30));
        let builder = if std::env::var_os("CLEANPLAYER_DISABLE_PROXY").is_some() {
            builder.no_proxy()
        } else {
            builder
        };
        let client = builder.build().unwrap_or_else(|_| Client::new());

        Self { config, client }
    }

    /// Create a client around an existing reqwest client
    #[must_use]
    pub fn with_http_client(config: OAuthConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Build the authorize URL for a PKCE pair
    ///
    /// Parameters: `client_id`, `response_type=code`, `redirect_uri`,
    /// space-separated `scope`, `code_challenge_method=S256`,
    /// `code_challenge`.
    #[must_use]
    pub fn authorization_url(&self, challenge: &PKCEChallenge) -> String {
        let params = [
            ("client_id", self.config.client_id.clone()),
            ("response_type", "code".to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("scope", self.config.scope_string()),
            ("code_challenge_method", challenge.challenge_method().to_string()),
            ("code_challenge", challenge.code_challenge.clone()),
        ];

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.config.authorization_url(), query_string)
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    /// Returns error if:
    /// - The provider rejects the redirect URI (`RedirectMismatch`)
    /// - The token endpoint answers non-2xx (`TokenEndpoint`)
    /// - The response body cannot be parsed
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenGrant, OAuthClientError> {
        if code.is_empty() {
            return Err(OAuthClientError::ConfigError("Authorization code is empty".to_string()));
        }

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ];

        self.post_token_request(&params, "authorization_code").await
    }

    /// Refresh an access token
    ///
    /// # Errors
    /// Returns error if:
    /// - No refresh token provided
    /// - The token endpoint answers non-2xx (revoked or expired token)
    /// - The response body cannot be parsed
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthClientError> {
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        self.post_token_request(&params, "refresh_token").await
    }

    async fn post_token_request(
        &self,
        params: &[(&str, &str)],
        grant_type: &str,
    ) -> Result<TokenGrant, OAuthClientError> {
        debug!(grant_type, "Posting token request");
        let response = self.client.post(self.config.token_url()).form(params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let oauth_error = serde_json::from_str::<OAuthError>(&body).ok();

            if let Some(e) = oauth_error.as_ref().filter(|e| e.is_redirect_mismatch()) {
                error!(
                    grant_type,
                    redirect_uri = %self.config.redirect_uri,
                    "Provider rejected redirect URI; check the registered redirect URI"
                );
                return Err(OAuthClientError::RedirectMismatch(e.to_string()));
            }

            warn!(grant_type, status = status.as_u16(), "Token endpoint rejected request");
            return Err(OAuthClientError::TokenEndpoint {
                status: status.as_u16(),
                error: oauth_error,
            });
        }

        let token_response: TokenResponse =
            response.json().await.map_err(|e| OAuthClientError::ParseError(e.to_string()))?;

        Ok(token_response.into())
    }

    /// Get the configured redirect URI
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.config.redirect_uri
    }

    /// Get a reference to the OAuth configuration
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }
}

#[async_trait]
impl TokenExchanger for OAuthClient {
    fn authorization_url(&self, challenge: &PKCEChallenge) -> String {
        Self::authorization_url(self, challenge)
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenGrant, OAuthClientError> {
        Self::exchange_code(self, code, verifier).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthClientError> {
        Self::refresh(self, refresh_token).await
    }

    fn redirect_uri(&self) -> &str {
        Self::redirect_uri(self)
    }
}
