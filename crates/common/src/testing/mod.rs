//! Testing utilities and helpers
//!
//! - **[`mocks`]**: scripted [`TokenExchanger`](crate::auth::TokenExchanger)
//!   for lifecycle tests that must not touch the network

pub mod mocks;

pub use mocks::MockOAuthClient;
