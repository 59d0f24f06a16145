//! Per-session context
//!
//! The resolved provider user id lives here, owned by one manager instance,
//! never in process-wide state. It is re-resolved each session and cleared
//! only by logout.

use std::fmt;

/// Lifecycle states of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    NoCredential,
    Authorizing,
    Exchanging,
    /// Tokens sit in the device-local store, not yet keyed by user id
    LocalOnly,
    Migrating,
    RemoteResident,
    Refreshing,
    Failed,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::Authorizing => "authorizing",
            Self::Exchanging => "exchanging",
            Self::LocalOnly => "local_only",
            Self::Migrating => "migrating",
            Self::RemoteResident => "remote_resident",
            Self::Refreshing => "refreshing",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Option<String>,
    pub state: SessionState,
}

impl SessionContext {
    #[must_use]
    pub const fn new() -> Self {
        Self { user_id: None, state: SessionState::NoCredential }
    }

    /// Resume a session whose user id is already known to the caller.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()), state: SessionState::RemoteResident }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
