//! Shared HTTP plumbing for the Web API, profile and REST store adapters

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
