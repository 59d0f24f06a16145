//! OAuth 2.0 types and structures
//!
//! Wire types for the token endpoint and the client-side configuration of
//! an authorization server that accepts public (PKCE) clients.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tokens issued by a code exchange or refresh grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,

    /// Absent when the provider keeps the previous refresh token valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (always "Bearer" for Spotify)
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    /// Granted scopes (space-separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenGrant {
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope: None,
        }
    }
}

/// Token endpoint response (RFC 6749 §5.1)
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl From<TokenResponse> for TokenGrant {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|token| !token.is_empty()),
            token_type: response.token_type,
            expires_in: response.expires_in,
            scope: response.scope,
        }
    }
}

/// Client-side view of the authorization server
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Scheme and host of the accounts service, e.g. `https://accounts.spotify.com`
    pub accounts_base_url: String,

    pub client_id: String,

    /// Sent verbatim on both the authorize redirect and the code exchange
    pub redirect_uri: String,

    pub scopes: Vec<String>,
}

impl OAuthConfig {
    #[must_use]
    pub fn new(
        accounts_base_url: String,
        client_id: String,
        redirect_uri: String,
        scopes: Vec<String>,
    ) -> Self {
        let accounts_base_url = accounts_base_url.trim_end_matches('/').to_string();
        Self { accounts_base_url, client_id, redirect_uri, scopes }
    }

    #[must_use]
    pub fn authorization_url(&self) -> String {
        format!("{}/authorize", self.accounts_base_url)
    }

    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_base_url)
    }

    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Error body returned by the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthError {
    /// Spotify reports a redirect mismatch as `invalid_grant` with an
    /// "Invalid redirect URI" description; RFC-style servers use
    /// `redirect_uri_mismatch`.
    #[must_use]
    pub fn is_redirect_mismatch(&self) -> bool {
        if self.error.eq_ignore_ascii_case("redirect_uri_mismatch") {
            return true;
        }
        self.error_description
            .as_deref()
            .map(str::to_ascii_lowercase)
            .is_some_and(|description| description.contains("redirect uri"))
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(description) = &self.error_description {
            write!(f, "{}: {}", self.error, description)
        } else {
            write!(f, "{}", self.error)
        }
    }
}
