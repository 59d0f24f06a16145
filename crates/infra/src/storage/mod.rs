//! Storage adapters
//!
//! Implementations of the core store ports:
//! - `KeychainLocalStore`: device-local key/value store in the OS keychain
//! - `RestCredentialRepository`: shared credential table over HTTP
//! - `SqliteCredentialRepository`: credential table in a local SQLite file

pub mod keychain_store;
pub mod rest_repository;
pub mod sqlite_repository;

pub use keychain_store::KeychainLocalStore;
pub use rest_repository::RestCredentialRepository;
pub use sqlite_repository::SqliteCredentialRepository;
