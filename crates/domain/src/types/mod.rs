//! Domain types and models

pub mod credential;

pub use credential::{CredentialRecord, LocalCredentials};
