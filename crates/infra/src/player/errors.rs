//! Playback error types
//!
//! Classifies failed Web API calls with retry metadata for callers that
//! schedule their own retries. The client itself never retries.

use cleanplayer_domain::CleanPlayerError;
use reqwest::StatusCode;
use thiserror::Error;

/// Categories of playback errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerErrorCategory {
    /// No usable token, or the token was rejected
    Authentication,
    /// 429 from the Web API
    RateLimit,
    /// 5xx
    Server,
    /// Other 4xx, including "no active device"
    Client,
    /// Connection failures and timeouts
    Network,
    /// Undecodable response bodies
    Protocol,
}

/// Playback operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("No usable access token; log in again")]
    NotAuthenticated,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("No active playback")]
    NoActivePlayback,

    #[error("Malformed response: {0}")]
    Parse(String),
}

impl PlayerError {
    /// Classify a non-success response.
    #[must_use]
    pub fn from_status(operation: &str, status: StatusCode, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("{operation} returned HTTP {}", status.as_u16())
        } else {
            format!("{operation} returned HTTP {}: {}", status.as_u16(), body.trim())
        };

        match status.as_u16() {
            401 | 403 => Self::Auth(message),
            429 => Self::RateLimit(message),
            500..=599 => Self::Server(message),
            _ => Self::Client(message),
        }
    }

    /// Get the error category for this error
    #[must_use]
    pub fn category(&self) -> PlayerErrorCategory {
        match self {
            Self::NotAuthenticated | Self::Auth(_) => PlayerErrorCategory::Authentication,
            Self::RateLimit(_) => PlayerErrorCategory::RateLimit,
            Self::Server(_) => PlayerErrorCategory::Server,
            Self::Client(_) | Self::NoActivePlayback => PlayerErrorCategory::Client,
            Self::Network(_) => PlayerErrorCategory::Network,
            Self::Parse(_) => PlayerErrorCategory::Protocol,
        }
    }

    /// Whether repeating the same call later can succeed without user action
    #[must_use]
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            PlayerErrorCategory::RateLimit
                | PlayerErrorCategory::Server
                | PlayerErrorCategory::Network
        )
    }

    /// Get suggested retry delay in seconds
    #[must_use]
    pub fn retry_delay_secs(&self) -> u64 {
        match self.category() {
            PlayerErrorCategory::RateLimit => 30,
            PlayerErrorCategory::Server => 5,
            PlayerErrorCategory::Network => 2,
            PlayerErrorCategory::Authentication
            | PlayerErrorCategory::Client
            | PlayerErrorCategory::Protocol => 0,
        }
    }
}

impl From<CleanPlayerError> for PlayerError {
    fn from(err: CleanPlayerError) -> Self {
        match err {
            CleanPlayerError::Auth(msg) => Self::Auth(msg),
            CleanPlayerError::Network(msg) => Self::Network(msg),
            CleanPlayerError::InvalidInput(msg) => Self::Parse(msg),
            other => Self::Client(other.to_string()),
        }
    }
}
