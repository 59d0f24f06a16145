//! # CleanPlayer Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Storage adapters (OS keychain, PostgREST table, SQLite)
//! - The profile-endpoint identity resolver
//! - The Web API playback client
//! - HTTP client, configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `cleanplayer-core`
//! - Contains all "impure" code (I/O, platform APIs)

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod http;
pub mod identity;
pub mod observability;
pub mod player;
pub mod storage;

// Re-export commonly used items
pub use bootstrap::{build_services, build_services_with, CleanPlayerServices};
pub use errors::InfraError;
pub use http::HttpClient;
pub use identity::SpotifyProfileClient;
pub use observability::init_tracing;
pub use player::{PlayerClient, PlayerError};
pub use storage::{KeychainLocalStore, RestCredentialRepository, SqliteCredentialRepository};
