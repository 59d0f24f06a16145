//! # CleanPlayer Domain
//!
//! Domain types and models for CleanPlayer.
//!
//! This crate contains:
//! - Credential records and the legacy local credential snapshot
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Local-store key names and provider defaults
//!
//! ## Architecture
//! - No dependencies on other CleanPlayer crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
