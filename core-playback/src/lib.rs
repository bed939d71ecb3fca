//! # Playback Module
//!
//! The global "now playing" session of the app.
//!
//! ## Overview
//!
//! - [`PlaybackController`] owns the canonical [`PlaybackState`] (current
//!   track, queue, position, play/pause, load status) and serializes every
//!   command from screens and remote controls into one session.
//! - [`NativeBackendAdapter`] translates those commands for the host's
//!   native media player and feeds native events back into the controller.
//! - [`machine::PlayerCore`] is the pure state machine both are built around.
//!
//! Screens never mutate state: they issue commands and observe snapshots.

pub mod adapter;
pub mod controller;
pub mod error;
pub mod machine;
pub mod poller;
pub mod queue;
pub mod types;

pub use adapter::NativeBackendAdapter;
pub use controller::PlaybackController;
pub use error::{PlaybackError, PlaybackFailure, Result};
pub use machine::PlayerCommand;
pub use types::{PlaybackState, PlaybackStatus, Track};
