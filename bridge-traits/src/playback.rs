//! Native media backend contract.
//!
//! The host wraps its platform player (AVPlayer + MPRemoteCommandCenter,
//! ExoPlayer + MediaSession, an `<audio>` element + Media Session API, ...)
//! behind [`NativePlayer`]. The core's playback adapter is the only caller:
//! it pushes commands down through the trait and receives native events
//! through a [`NativeEventSink`] handed over with
//! [`NativePlayer::attach_events`].
//!
//! Implementations hold no playback policy. They report what the platform
//! is doing and forward lock-screen / headset intents as
//! [`RemoteCommand`]s without interpreting them.

use crate::{
    error::{BridgeError, Result},
    platform::PlatformSendSync,
};
use core_async::sync::mpsc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lock-screen / media-session metadata for one queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Stable identifier of the track.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Display artist, if any.
    pub artist: Option<String>,
    /// Audio URL the native player should stream.
    pub url: String,
    /// Artwork shown on the lock screen.
    pub artwork_url: Option<String>,
    /// Duration when known ahead of decoding.
    pub duration: Option<Duration>,
}

/// Looping behaviour requested from the native player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Play through the queue once.
    #[default]
    Off,
    /// Loop the current track indefinitely.
    Track,
    /// Wrap around to the first track after the last one.
    Queue,
}

/// Intents originating outside the app: lock screen, headset buttons,
/// OS media widgets, car displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum RemoteCommand {
    Play,
    Pause,
    Next,
    Previous,
    Seek { position_ms: u64 },
    Stop,
}

/// Events pushed upward by the native player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum NativeEvent {
    /// Current playback position.
    PositionUpdate { position_ms: u64 },
    /// The platform started or stopped producing audio.
    PlaybackStateChange { playing: bool },
    /// Playback failed after it was started.
    Error { error: BridgeError },
    /// The native queue ran out of tracks.
    QueueEnded,
    /// A remote-control intent.
    Remote { command: RemoteCommand },
}

/// Sending half used by the native player to report [`NativeEvent`]s.
///
/// Cloneable and cheap; events are delivered in send order.
#[derive(Debug, Clone)]
pub struct NativeEventSink {
    sender: mpsc::UnboundedSender<NativeEvent>,
}

/// Receiving half consumed by the core's playback adapter.
pub type NativeEventReceiver = mpsc::UnboundedReceiver<NativeEvent>;

impl NativeEventSink {
    /// Create a connected sink / receiver pair.
    pub fn channel() -> (Self, NativeEventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Push an event. Returns `false` once the core has shut down.
    pub fn emit(&self, event: NativeEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Shorthand for [`NativeEvent::Remote`].
    pub fn remote(&self, command: RemoteCommand) -> bool {
        self.emit(NativeEvent::Remote { command })
    }

    /// Shorthand for [`NativeEvent::Error`].
    pub fn error(&self, error: BridgeError) -> bool {
        self.emit(NativeEvent::Error { error })
    }

    /// Returns `true` if the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Trait for host adapters that drive the platform's native audio engine.
///
/// Every method reports failures as [`BridgeError`] instead of panicking or
/// surfacing platform exceptions.
#[async_trait::async_trait]
pub trait NativePlayer: PlatformSendSync {
    /// Configure the background audio session, remote command handlers and
    /// lock-screen integration. Called once before any other command.
    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    /// Register the sink that receives native events. Replaces any previous sink.
    fn attach_events(&self, sink: NativeEventSink);

    /// Replace the native queue with `queue` and make `item` current.
    /// Publishes `item` as the lock-screen now-playing entry.
    async fn configure(&self, item: MediaItem, queue: Vec<MediaItem>) -> Result<()>;

    /// Start or resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause without releasing the current item.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position in the current item.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Advance to the next item of the configured queue.
    async fn skip_next(&self) -> Result<()>;

    /// Move back to the previous item of the configured queue.
    async fn skip_previous(&self) -> Result<()>;

    /// Stop playback and clear the native queue.
    async fn stop(&self) -> Result<()>;

    /// Set native looping behaviour.
    async fn set_repeat_mode(&self, _mode: RepeatMode) -> Result<()> {
        Err(BridgeError::Unsupported("repeat mode".to_string()))
    }

    /// Current playback position of the active item.
    async fn position(&self) -> Result<Duration>;

    /// Duration of the active item, once the platform knows it.
    async fn duration(&self) -> Result<Option<Duration>>;
}
