//! # Native Backend Adapter
//!
//! Translation layer between the controller's abstract commands and the
//! host's [`NativePlayer`].
//!
//! The adapter owns no playback policy. It converts tracks into lock-screen
//! [`MediaItem`]s, runs the load pipeline the state machine asked for, keeps
//! native failures inside the [`BridgeError`] taxonomy and maps remote-control
//! intents onto the very same [`PlayerCommand`]s a UI button would issue.

use crate::machine::{
    LoadMode, LoadOutcome, LoadRequest, PlayerCommand, PositionSample, TransportCommand,
};
use crate::types::Track;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{NativeEventReceiver, NativeEventSink, NativePlayer, RemoteCommand, RepeatMode};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

impl From<RemoteCommand> for PlayerCommand {
    fn from(command: RemoteCommand) -> Self {
        match command {
            RemoteCommand::Play => PlayerCommand::Play,
            RemoteCommand::Pause => PlayerCommand::Pause,
            RemoteCommand::Next => PlayerCommand::Next,
            RemoteCommand::Previous => PlayerCommand::Previous,
            RemoteCommand::Seek { position_ms } => PlayerCommand::Seek {
                position_ms: i64::try_from(position_ms).unwrap_or(i64::MAX),
            },
            RemoteCommand::Stop => PlayerCommand::Stop,
        }
    }
}

fn to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Thin wrapper around the host's native player.
#[derive(Clone)]
pub struct NativeBackendAdapter {
    player: Arc<dyn NativePlayer>,
}

impl std::fmt::Debug for NativeBackendAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBackendAdapter")
            .field("player", &"NativePlayer { ... }")
            .finish()
    }
}

impl NativeBackendAdapter {
    pub fn new(player: Arc<dyn NativePlayer>) -> Self {
        Self { player }
    }

    /// Configure the audio session and remote-command handlers.
    pub async fn setup(&self) -> BridgeResult<()> {
        self.player.setup().await
    }

    /// Hand a fresh event sink to the native player and return the receiving end.
    pub fn attach_events(&self) -> NativeEventReceiver {
        let (sink, receiver) = NativeEventSink::channel();
        self.player.attach_events(sink);
        receiver
    }

    /// Replace the native queue and publish `track` as now playing.
    #[instrument(skip(self, track, queue), fields(track_id = %track.id, queue_len = queue.len()))]
    pub async fn configure(&self, track: &Track, queue: &[Track]) -> BridgeResult<()> {
        debug!(url = redact_url(&track.audio_url), "Configuring native queue");
        let items = queue.iter().map(Track::to_media_item).collect();
        self.player.configure(track.to_media_item(), items).await
    }

    pub async fn play(&self) -> BridgeResult<()> {
        self.player.play().await
    }

    pub async fn pause(&self) -> BridgeResult<()> {
        self.player.pause().await
    }

    pub async fn seek(&self, position_ms: u64) -> BridgeResult<()> {
        self.player.seek(Duration::from_millis(position_ms)).await
    }

    pub async fn skip_next(&self) -> BridgeResult<()> {
        self.player.skip_next().await
    }

    pub async fn skip_previous(&self) -> BridgeResult<()> {
        self.player.skip_previous().await
    }

    pub async fn stop(&self) -> BridgeResult<()> {
        self.player.stop().await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> BridgeResult<()> {
        self.player.set_repeat_mode(mode).await
    }

    /// Bring the requested track to the native player and start it.
    ///
    /// `is_current` is checked before every native step. Once it returns
    /// `false` the remaining steps are skipped and `Ok(None)` is returned, so
    /// a superseded load never starts playback.
    ///
    /// The duration lookup afterwards is best-effort: a failure there does
    /// not fail the load.
    #[instrument(skip(self, request, is_current), fields(track_id = %request.track.id, mode = ?request.mode))]
    pub async fn load<F>(
        &self,
        request: &LoadRequest,
        is_current: F,
    ) -> BridgeResult<Option<LoadOutcome>>
    where
        F: Fn() -> bool,
    {
        if !is_current() {
            debug!("Load superseded before it started");
            return Ok(None);
        }
        match request.mode {
            LoadMode::Configure => self.configure(&request.track, &request.queue).await?,
            LoadMode::SkipNext => self.skip_next().await?,
            LoadMode::SkipPrevious => self.skip_previous().await?,
        }
        if !is_current() {
            debug!("Load superseded; not starting playback");
            return Ok(None);
        }
        self.play().await?;

        let duration_ms = match self.player.duration().await {
            Ok(duration) => duration.map(to_millis),
            Err(err) => {
                debug!(error = %err, "Duration not available yet");
                None
            }
        };
        Ok(Some(LoadOutcome { duration_ms }))
    }

    /// Execute one transport command.
    pub async fn execute(&self, command: TransportCommand) -> BridgeResult<()> {
        match command {
            TransportCommand::SetPlaying { playing: true, .. } => self.play().await,
            TransportCommand::SetPlaying { playing: false, .. } => self.pause().await,
            TransportCommand::Seek { position_ms, .. } => self.seek(position_ms).await,
            TransportCommand::Stop => self.stop().await,
            TransportCommand::SetRepeatMode(mode) => self.set_repeat_mode(mode).await,
        }
    }

    /// Read position and duration for the poller.
    pub async fn sample(&self) -> BridgeResult<PositionSample> {
        let position = self.player.position().await?;
        let duration = self.player.duration().await?;
        Ok(PositionSample {
            position_ms: to_millis(position),
            duration_ms: duration.map(to_millis),
        })
    }
}
