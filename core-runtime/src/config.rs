//! # Core Configuration Module
//!
//! Builder-based configuration for the playback core.
//!
//! ## Required Dependencies
//!
//! - `NativePlayer` - The native media backend. There is no software fallback;
//!   building without one fails with [`Error::CapabilityMissing`].
//!
//! ## Optional Dependencies
//!
//! - `Clock` - Time source for the end-of-track re-entry guard (default: [`SystemClock`])
//! - `LifecycleObserver` - Suspends position polling while the app is backgrounded
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PlaybackSettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .native_player(Arc::new(MyNativePlayer::new()))
//!     .playback(PlaybackSettings::default().with_poll_interval_ms(500))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics: no NativePlayer was injected
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing native player");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, LifecycleObserver, NativePlayer, RepeatMode, SystemClock};
use std::sync::Arc;
use std::time::Duration;

const MIN_POLL_INTERVAL_MS: u64 = 10;
const MAX_POLL_INTERVAL_MS: u64 = 5_000;
const MAX_END_EPSILON_MS: u64 = 5_000;

/// Tuning knobs for the playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    /// Interval between native position queries while a track is ready
    pub poll_interval_ms: u64,

    /// A track counts as ended once `position >= duration - epsilon`
    pub end_of_track_epsilon_ms: u64,

    /// Minimum time between two end-of-track transitions
    pub end_reentry_guard_ms: u64,

    /// Repeat mode the controller starts with
    pub default_repeat: RepeatMode,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            end_of_track_epsilon_ms: 100,
            end_reentry_guard_ms: 1_000,
            default_repeat: RepeatMode::Off,
        }
    }
}

impl PlaybackSettings {
    pub fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    pub fn with_end_of_track_epsilon_ms(mut self, epsilon_ms: u64) -> Self {
        self.end_of_track_epsilon_ms = epsilon_ms;
        self
    }

    pub fn with_end_reentry_guard_ms(mut self, guard_ms: u64) -> Self {
        self.end_reentry_guard_ms = guard_ms;
        self
    }

    pub fn with_default_repeat(mut self, mode: RepeatMode) -> Self {
        self.default_repeat = mode;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(Error::Config(format!(
                "Poll interval must be between {}ms and {}ms, got {}ms",
                MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, self.poll_interval_ms
            )));
        }

        if self.end_of_track_epsilon_ms >= MAX_END_EPSILON_MS {
            return Err(Error::Config(format!(
                "End-of-track epsilon must be below {}ms",
                MAX_END_EPSILON_MS
            )));
        }

        Ok(())
    }
}

/// Core configuration for the playback engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Native media backend (required)
    pub native_player: Arc<dyn NativePlayer>,

    pub clock: Arc<dyn Clock>,

    /// App lifecycle observer (optional)
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,

    pub playback: PlaybackSettings,

    /// Capacity of the broadcast channel behind the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("native_player", &"NativePlayer { ... }")
            .field("clock", &"Clock { ... }")
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .field("playback", &self.playback)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.playback.validate()?;

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn native_player_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "NativePlayer".to_string(),
        message: "A NativePlayer implementation is required to drive audio output. \
                 iOS/Android: inject the platform media session bridge. \
                 Desktop and tests: inject a simulated player."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    native_player: Option<Arc<dyn NativePlayer>>,
    clock: Option<Arc<dyn Clock>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    playback: Option<PlaybackSettings>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the native media backend (required).
    pub fn native_player(mut self, player: Arc<dyn NativePlayer>) -> Self {
        self.native_player = Some(player);
        self
    }

    /// Overrides the time source. Tests use `ManualClock`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    pub fn playback(mut self, settings: PlaybackSettings) -> Self {
        self.playback = Some(settings);
        self
    }

    /// Default: 100 events
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig`.
    ///
    /// Fails when no `NativePlayer` was injected or any setting is out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let native_player = self.native_player.ok_or_else(native_player_missing_error)?;

        let config = CoreConfig {
            native_player,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            lifecycle_observer: self.lifecycle_observer,
            playback: self.playback.unwrap_or_default(),
            event_buffer_size: self.event_buffer_size.unwrap_or(100),
        };

        config.validate()?;

        Ok(config)
    }
}
