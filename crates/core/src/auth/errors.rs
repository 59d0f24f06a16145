//! Lifecycle error kinds
//!
//! Every failure the manager can report. None of these escape the public
//! `get_usable_token`/`login`/`complete_login` calls; they are logged and
//! turned into session events. The `try_*` variants return them as-is.

use cleanplayer_common::auth::OAuthClientError;
use cleanplayer_domain::CleanPlayerError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Verifier/challenge generation failed; login aborted
    #[error("PKCE generation failed: {0}")]
    Pkce(String),

    /// Provider rejected the redirect URI. Configuration bug, never retried.
    #[error("Redirect URI rejected by provider: {0}")]
    RedirectMismatch(String),

    /// Authorization code invalid, expired or already consumed
    #[error("Authorization code exchange failed{}: {message}", status_suffix(.status))]
    TokenExchange { status: Option<u16>, message: String },

    /// Profile endpoint rejected the token
    #[error("Identity resolution failed: {0}")]
    IdentityResolution(String),

    /// Refresh token invalid or revoked
    #[error("Token refresh failed{}: {message}", status_suffix(.status))]
    Refresh { status: Option<u16>, message: String },

    /// A credential store is unreachable or unconfigured
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// No credential is known for this session
    #[error("Login required")]
    LoginRequired,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl AuthError {
    /// Whether the session must restart from `NoCredential`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::IdentityResolution(_) | Self::StoreUnavailable(_))
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Pkce(_) => "pkce",
            Self::RedirectMismatch(_) => "redirect_mismatch",
            Self::TokenExchange { .. } => "token_exchange",
            Self::IdentityResolution(_) => "identity_resolution",
            Self::Refresh { .. } => "refresh",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::LoginRequired => "login_required",
        }
    }

    pub(crate) fn from_exchange(err: &OAuthClientError) -> Self {
        match err {
            OAuthClientError::RedirectMismatch(msg) => Self::RedirectMismatch(msg.clone()),
            other => Self::TokenExchange { status: other.status(), message: other.to_string() },
        }
    }

    pub(crate) fn from_refresh(err: &OAuthClientError) -> Self {
        Self::Refresh { status: err.status(), message: err.to_string() }
    }

    pub(crate) fn store(err: &CleanPlayerError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }

    pub(crate) fn identity(err: &CleanPlayerError) -> Self {
        Self::IdentityResolution(err.to_string())
    }
}
