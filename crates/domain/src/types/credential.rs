//! Credential records
//!
//! [`CredentialRecord`] is the durable unit of state held by the remote
//! store, keyed by the provider's user id. [`LocalCredentials`] is the raw
//! snapshot a device-local store may still hold from before the remote store
//! existed.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair owned by one provider user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    /// When `access_token` was minted
    pub issued_at: DateTime<Utc>,
    pub lifetime_seconds: i64,
}

impl CredentialRecord {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        issued_at: DateTime<Utc>,
        lifetime_seconds: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            issued_at,
            lifetime_seconds,
        }
    }

    /// `None` when the lifetime does not fit the calendar range; such a
    /// record is treated as stale.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        expiry(self.issued_at, self.lifetime_seconds)
    }

    /// A record missing either token cannot be used or refreshed.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.access_token.is_empty() || self.refresh_token.is_empty()
    }

    /// Usable iff present and `now < issued_at + lifetime`. No safety margin.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_absent() && self.expires_at().is_some_and(|expires_at| now < expires_at)
    }

    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }

    /// Apply a refresh grant. The provider may omit a rotated refresh token,
    /// in which case the current one is kept.
    #[must_use]
    pub fn refreshed(
        &self,
        access_token: String,
        rotated_refresh_token: Option<String>,
        lifetime_seconds: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let refresh_token = rotated_refresh_token
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| self.refresh_token.clone());

        Self {
            user_id: self.user_id.clone(),
            access_token,
            refresh_token,
            issued_at,
            lifetime_seconds,
        }
    }
}

/// Tokens kept in the device-local store before migration
///
/// `expiryTime` is stored in seconds and `tokenGenerationTime` in epoch
/// milliseconds. Unparseable timestamps make the snapshot stale rather
/// than absent, so the refresh token is never discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub lifetime_seconds: Option<i64>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl LocalCredentials {
    /// Build a snapshot from raw local-store values.
    ///
    /// Returns `None` when either token is missing or empty.
    #[must_use]
    pub fn from_raw(
        access_token: Option<String>,
        refresh_token: Option<String>,
        expiry_time: Option<&str>,
        generation_time: Option<&str>,
    ) -> Option<Self> {
        let access_token = access_token.filter(|t| !t.is_empty())?;
        let refresh_token = refresh_token.filter(|t| !t.is_empty())?;

        let lifetime_seconds = expiry_time.and_then(|s| s.trim().parse::<i64>().ok());
        let generated_at = generation_time
            .and_then(|s| s.trim().parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Some(Self { access_token, refresh_token, lifetime_seconds, generated_at })
    }

    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        match (self.generated_at, self.lifetime_seconds) {
            (Some(generated_at), Some(lifetime)) => {
                expiry(generated_at, lifetime).is_some_and(|expires_at| now < expires_at)
            }
            _ => false,
        }
    }

    /// Encode `expiryTime` the way the local store expects it.
    #[must_use]
    pub fn expiry_time_value(lifetime_seconds: i64) -> String {
        lifetime_seconds.to_string()
    }

    /// Encode `tokenGenerationTime` (epoch milliseconds).
    #[must_use]
    pub fn generation_time_value(at: DateTime<Utc>) -> String {
        at.timestamp_millis().to_string()
    }

    /// Convert into a remote record for `user_id`.
    ///
    /// Missing timestamps produce an already-stale record so the first use
    /// goes through a refresh.
    #[must_use]
    pub fn into_record(self, user_id: impl Into<String>) -> CredentialRecord {
        let issued_at = self.generated_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        CredentialRecord::new(
            user_id,
            self.access_token,
            self.refresh_token,
            issued_at,
            self.lifetime_seconds.unwrap_or(0),
        )
    }
}

fn expiry(issued_at: DateTime<Utc>, lifetime_seconds: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(lifetime_seconds)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
}
