//! Web API playback client
//!
//! Thin authenticated wrappers over the player endpoints. Tokens come from
//! any [`AccessTokenProvider`](cleanplayer_core::AccessTokenProvider); this
//! module never refreshes or stores credentials itself.

pub mod client;
pub mod errors;
pub mod types;

pub use client::PlayerClient;
pub use errors::{PlayerError, PlayerErrorCategory};
pub use types::{Artist, Device, PlaybackState, RepeatMode, Track};
