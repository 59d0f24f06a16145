//! In-memory adapters
//!
//! Process-local implementations of the ports, for tests and for embedding
//! the manager where no keychain or database is available. Clones share
//! state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cleanplayer_domain::{CleanPlayerError, CredentialRecord, Result};
use parking_lot::Mutex;

use super::ports::{CredentialRepository, IdentityResolver, LocalStore};

/// `LocalStore` backed by a `HashMap`
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocalStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { entries: Arc::new(Mutex::new(map)) }
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// `CredentialRepository` backed by a `HashMap`
///
/// Can be switched offline to exercise store-unavailable paths.
#[derive(Debug, Clone)]
pub struct InMemoryCredentialRepository {
    records: Arc<Mutex<HashMap<String, CredentialRecord>>>,
    upserts: Arc<AtomicUsize>,
    available: Arc<AtomicBool>,
}

impl InMemoryCredentialRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            upserts: Arc::new(AtomicUsize::new(0)),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Seed a record without counting it as an upsert.
    pub fn insert(&self, record: CredentialRecord) {
        self.records.lock().insert(record.user_id.clone(), record);
    }

    #[must_use]
    pub fn record(&self, user_id: &str) -> Option<CredentialRecord> {
        self.records.lock().get(user_id).cloned()
    }

    #[must_use]
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CleanPlayerError::Storage("credential store offline".to_string()))
        }
    }
}

impl Default for InMemoryCredentialRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn upsert(&self, record: &CredentialRecord) -> Result<()> {
        self.ensure_available()?;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.insert(record.clone());
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>> {
        self.ensure_available()?;
        Ok(self.record(user_id))
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        self.ensure_available()?;
        self.records.lock().remove(user_id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<CredentialRecord>> {
        self.ensure_available()?;
        let mut records: Vec<_> = self.records.lock().values().cloned().collect();
        records.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(records)
    }
}

/// `IdentityResolver` with a fixed token → user id table
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    users: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<AtomicUsize>,
}

impl StaticIdentityResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `access_token` as belonging to `user_id`.
    #[must_use]
    pub fn with_token(self, access_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.users.lock().insert(access_token.into(), user_id.into());
        self
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve_user_id(&self, access_token: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.users
            .lock()
            .get(access_token)
            .cloned()
            .ok_or_else(|| CleanPlayerError::Auth("profile endpoint returned 401".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[tokio::test]
    async fn local_store_remove_is_idempotent() {
        let store = InMemoryLocalStore::with_entries([("verifier", "abc")]);

        store.remove("verifier").await.unwrap();
        store.remove("verifier").await.unwrap();

        assert!(store.get("verifier").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn repository_upsert_replaces_by_user_id() {
        let repo = InMemoryCredentialRepository::new();
        let now = Utc::now();

        repo.upsert(&CredentialRecord::new("u1", "A", "R", now, 3600)).await.unwrap();
        repo.upsert(&CredentialRecord::new("u1", "A2", "R", now, 3600)).await.unwrap();
        repo.upsert(&CredentialRecord::new("u2", "B", "S", now - Duration::hours(1), 3600))
            .await
            .unwrap();

        assert_eq!(repo.get("u1").await.unwrap().unwrap().access_token, "A2");
        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].user_id, "u1");
        assert_eq!(repo.upsert_count(), 3);

        repo.delete("u1").await.unwrap();
        assert!(repo.get("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn offline_repository_reports_storage_error() {
        let repo = InMemoryCredentialRepository::new();
        repo.set_available(false);

        assert!(matches!(repo.get("u1").await, Err(CleanPlayerError::Storage(_))));
    }

    #[tokio::test]
    async fn static_resolver_rejects_unknown_tokens() {
        let resolver = StaticIdentityResolver::new().with_token("A", "u1");

        assert_eq!(resolver.resolve_user_id("A").await.unwrap(), "u1");
        assert!(resolver.resolve_user_id("expired").await.is_err());
        assert_eq!(resolver.calls(), 2);
    }
}
