//! Session events
//!
//! Broadcast to every subscriber of a manager. `SessionReset` tells
//! consumers to drop whatever in-memory state they derived from the old
//! session.

use super::errors::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    LoginStarted,
    LoggedIn { user_id: String },
    CredentialsMigrated { user_id: String },
    TokenRefreshed { user_id: String },
    LoginRequired { reason: String },
    AuthFailed { kind: &'static str, message: String },
    LoggedOut,
    SessionReset,
}

impl AuthEvent {
    pub(crate) fn from_error(err: &AuthError) -> Self {
        match err {
            AuthError::LoginRequired => Self::LoginRequired { reason: err.to_string() },
            other => Self::AuthFailed { kind: other.kind(), message: other.to_string() },
        }
    }

    /// Text suitable for a toast, if the event is user-visible.
    #[must_use]
    pub fn notification(&self) -> Option<String> {
        match self {
            Self::LoggedIn { .. } => Some("Logged in!".to_string()),
            Self::TokenRefreshed { .. } => Some("Regenerated access token".to_string()),
            Self::LoginRequired { .. } => Some("Please log in again".to_string()),
            Self::AuthFailed { kind: "refresh", .. } => Some("Error refreshing token".to_string()),
            Self::AuthFailed { kind: "redirect_mismatch", .. } => {
                Some("Login is misconfigured: redirect URI rejected".to_string())
            }
            Self::AuthFailed { kind: "token_exchange", .. } => {
                Some("Login failed, please log in again".to_string())
            }
            Self::AuthFailed { message, .. } => Some(format!("Error: {message}")),
            Self::LoggedOut => Some("Logged out!".to_string()),
            Self::LoginStarted | Self::CredentialsMigrated { .. } | Self::SessionReset => None,
        }
    }
}
