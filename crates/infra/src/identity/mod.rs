//! Identity resolution against the provider's profile endpoint

pub mod profile_client;

pub use profile_client::{SpotifyProfile, SpotifyProfileClient};
