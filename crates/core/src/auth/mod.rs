//! Credential lifecycle
//!
//! ```text
//!   login() ──► Authorizing ──► complete_login(code) ──► Exchanging
//!                                                          │
//!                          identity + upsert ok ◄──────────┤
//!                                   │                      └─► LocalOnly (parked)
//!                                   ▼                              │
//!   get_usable_token() ──► RemoteResident ◄── Migrating ◄──────────┘
//!                              │     ▲
//!                        stale ▼     │ ok
//!                           Refreshing ──► Failed
//! ```
//!
//! Consumers only ever call [`CredentialLifecycleManager::get_usable_token`]
//! (or the [`AccessTokenProvider`](ports::AccessTokenProvider) impl) plus
//! `login`/`complete_login`/`log_out` at session boundaries.

pub mod errors;
pub mod events;
pub mod manager;
pub mod memory;
pub mod ports;
pub mod session;

pub use errors::AuthError;
pub use events::AuthEvent;
pub use manager::CredentialLifecycleManager;
pub use memory::{InMemoryCredentialRepository, InMemoryLocalStore, StaticIdentityResolver};
pub use session::{SessionContext, SessionState};
