//! # Host Bridge Traits
//!
//! Contracts between the playback core and the host platform.
//!
//! ## Overview
//!
//! Each trait represents a capability the core requires but that must be
//! implemented per platform (iOS, Android, web, desktop).
//!
//! ### Playback
//! - [`NativePlayer`](playback::NativePlayer) - Native media engine, lock-screen
//!   metadata and remote-control integration
//! - [`NativeEventSink`](playback::NativeEventSink) - Channel the native side
//!   uses to report position, state changes, errors and remote intents
//!
//! ### Platform Integration
//! - [`LifecycleObserver`](background::LifecycleObserver) - App foreground/background transitions
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits report failures as [`BridgeError`](error::BridgeError),
//! whose variants encode the native reason taxonomy (`unsupported`,
//! `networkError`, `deviceBusy`, `unknown`). Implementations convert platform
//! exceptions at the boundary.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across
//! async tasks.

pub mod background;
pub mod error;
pub mod platform;
pub mod playback;
pub mod time;

pub use error::{BridgeError, NativeErrorReason};

pub use background::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use playback::{
    MediaItem, NativeEvent, NativeEventReceiver, NativeEventSink, NativePlayer, RemoteCommand,
    RepeatMode,
};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
