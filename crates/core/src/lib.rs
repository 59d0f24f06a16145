//! # CleanPlayer Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The credential lifecycle manager (login, code exchange, migration,
//!   refresh-before-use, logout)
//! - Port/adapter interfaces (traits) for the local store, remote store and
//!   identity resolver
//! - In-memory adapters for tests and headless embedding
//!
//! ## Architecture Principles
//! - Only depends on `cleanplayer-common` and `cleanplayer-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod auth;

// Re-export specific items to avoid ambiguity
pub use auth::ports::{AccessTokenProvider, CredentialRepository, IdentityResolver, LocalStore};
pub use auth::{AuthError, AuthEvent, CredentialLifecycleManager, SessionContext, SessionState};
