//! # Playback State Machine
//!
//! Pure transition logic behind the [`PlaybackController`](crate::PlaybackController).
//!
//! [`PlayerCore::handle`] consumes one [`Input`] (a command, a native event,
//! the result of an earlier native call, a position sample or a lifecycle
//! change), updates the canonical [`PlaybackState`] and returns the
//! [`Effect`]s the controller task has to carry out. Nothing in here awaits,
//! spawns or reads the clock, so every interleaving can be replayed in a
//! plain unit test.
//!
//! ## Reconciliation
//!
//! - Loads are tagged with a monotonically increasing generation. Results and
//!   position samples carrying an older generation are dropped.
//! - Toggle and seek are optimistic: the predicted value is written to the
//!   state immediately while the last *confirmed* value is kept aside as the
//!   rollback target. Acknowledgements carry a sequence number; only the
//!   newest request may roll back.
//! - A native `PlaybackStateChange` is authoritative and invalidates every
//!   pending toggle acknowledgement.
//! - Play/pause and seek requests made while a track is loading are kept in
//!   the state and sent once the load completes.

use crate::error::{PlaybackError, PlaybackFailure};
use crate::queue;
use crate::types::{PlaybackState, PlaybackStatus, Track};
use bridge_traits::{BridgeError, LifecycleState, NativeEvent, RepeatMode};
use core_runtime::config::PlaybackSettings;
use core_runtime::events::{CoreEvent, PlaybackEvent, QueueEvent};
use tracing::{debug, info, warn};

/// Commands accepted by the controller. UI buttons and remote-control
/// intents both end up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    LoadAndPlay {
        track: Track,
        queue: Option<Vec<Track>>,
    },
    Toggle,
    /// Resume unless already playing.
    Play,
    /// Pause unless already paused.
    Pause,
    Next,
    Previous,
    /// Target position; negative values clamp to zero.
    Seek {
        position_ms: i64,
    },
    Stop,
    SetRepeatMode(RepeatMode),
}

/// How the native side reaches the requested track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Replace the native queue and make the track current.
    Configure,
    /// The native queue is in sync; step forward.
    SkipNext,
    /// The native queue is in sync; step back.
    SkipPrevious,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub track: Track,
    pub queue: Vec<Track>,
    pub mode: LoadMode,
}

/// Successful load confirmation from the native side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOutcome {
    pub duration_ms: Option<u64>,
}

/// Native transport commands. Executed in order with loads by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    SetPlaying { seq: u64, playing: bool },
    Seek { seq: u64, position_ms: u64 },
    Stop,
    SetRepeatMode(RepeatMode),
}

impl TransportCommand {
    /// Play/pause and seek only make sense for the load that issued them.
    /// Stop and repeat mode apply to whatever the native player holds.
    pub fn is_generation_bound(&self) -> bool {
        matches!(
            self,
            TransportCommand::SetPlaying { .. } | TransportCommand::Seek { .. }
        )
    }
}

/// Position and duration read from the native player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSample {
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(PlayerCommand),
    Native(NativeEvent),
    LoadCompleted {
        generation: u64,
        result: Result<LoadOutcome, BridgeError>,
    },
    TransportCompleted {
        generation: u64,
        command: TransportCommand,
        result: Result<(), BridgeError>,
    },
    PositionSampled {
        generation: u64,
        sample: PositionSample,
    },
    Lifecycle(LifecycleState),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Load {
        generation: u64,
        request: LoadRequest,
    },
    Transport {
        generation: u64,
        command: TransportCommand,
    },
    StartPolling {
        generation: u64,
    },
    StopPolling,
    Emit(CoreEvent),
}

/// Owner of the canonical [`PlaybackState`] plus the bookkeeping needed to
/// reconcile it with the native player.
#[derive(Debug)]
pub struct PlayerCore {
    state: PlaybackState,
    settings: PlaybackSettings,
    generation: u64,
    /// The native queue mirrors `state.queue`, so adjacent moves may skip.
    native_queue_synced: bool,
    /// Repeat mode the native player acknowledged.
    native_repeat: RepeatMode,

    confirmed_playing: bool,
    toggle_seq: u64,
    confirmed_toggle_seq: u64,

    confirmed_position_ms: u64,
    seek_seq: u64,
    seek_in_flight: bool,
    /// Seek requested while loading, applied once the load is confirmed.
    pending_seek_ms: Option<u64>,

    ended_generation: Option<u64>,
    last_ended_at_ms: Option<i64>,

    foreground: bool,
    polling_generation: Option<u64>,
}

impl PlayerCore {
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            state: PlaybackState::default(),
            settings,
            generation: 0,
            native_queue_synced: false,
            native_repeat: RepeatMode::Off,
            confirmed_playing: false,
            toggle_seq: 0,
            confirmed_toggle_seq: 0,
            confirmed_position_ms: 0,
            seek_seq: 0,
            seek_in_flight: false,
            pending_seek_ms: None,
            ended_generation: None,
            last_ended_at_ms: None,
            foreground: true,
            polling_generation: None,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Generation of the newest load.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_polling(&self) -> bool {
        self.polling_generation.is_some()
    }

    /// Apply one input. `now_ms` is the wall clock in Unix milliseconds.
    pub fn handle(&mut self, input: Input, now_ms: i64) -> Vec<Effect> {
        let mut effects = Vec::new();

        match input {
            Input::Command(command) => self.on_command(command, &mut effects),
            Input::Native(event) => self.on_native_event(event, now_ms, &mut effects),
            Input::LoadCompleted { generation, result } => {
                self.on_load_completed(generation, result, &mut effects)
            }
            Input::TransportCompleted {
                generation,
                command,
                result,
            } => self.on_transport_completed(generation, command, result, &mut effects),
            Input::PositionSampled { generation, sample } => {
                if generation != self.generation {
                    debug!(generation, current = self.generation, "Dropping stale position sample");
                } else {
                    self.on_position(sample.position_ms, sample.duration_ms, now_ms, &mut effects);
                }
            }
            Input::Lifecycle(lifecycle) => {
                self.foreground = lifecycle.is_active();
                debug!(?lifecycle, "Lifecycle changed");
            }
        }

        self.sync_polling(&mut effects);
        debug_assert!(self.state.is_consistent(), "current track missing from queue");
        effects
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn on_command(&mut self, command: PlayerCommand, effects: &mut Vec<Effect>) {
        match command {
            PlayerCommand::LoadAndPlay { track, queue } => {
                let queue = queue::build_queue(&track, queue);
                self.start_load(track, queue, LoadMode::Configure, true, effects);
            }
            PlayerCommand::Toggle => self.request_playing(None, effects),
            PlayerCommand::Play => self.request_playing(Some(true), effects),
            PlayerCommand::Pause => self.request_playing(Some(false), effects),
            PlayerCommand::Next => self.step(true, effects),
            PlayerCommand::Previous => self.step(false, effects),
            PlayerCommand::Seek { position_ms } => self.seek(position_ms, effects),
            PlayerCommand::Stop => self.stop(effects),
            PlayerCommand::SetRepeatMode(mode) => {
                if mode == self.state.repeat {
                    return;
                }
                info!(?mode, "Repeat mode changed");
                self.state.repeat = mode;
                effects.push(Effect::Transport {
                    generation: self.generation,
                    command: TransportCommand::SetRepeatMode(mode),
                });
                effects.push(Effect::Emit(CoreEvent::Queue(QueueEvent::RepeatModeChanged {
                    mode,
                })));
            }
        }
    }

    fn start_load(
        &mut self,
        track: Track,
        queue: Vec<Track>,
        mode: LoadMode,
        queue_replaced: bool,
        effects: &mut Vec<Effect>,
    ) {
        self.generation += 1;
        let generation = self.generation;

        if queue_replaced {
            effects.push(Effect::Emit(CoreEvent::Queue(QueueEvent::Replaced {
                track_ids: queue.iter().map(|t| t.id.clone()).collect(),
                current_index: queue::index_of(&queue, &track.id),
            })));
        } else if let Some(index) = queue::index_of(&queue, &track.id) {
            effects.push(Effect::Emit(CoreEvent::Queue(QueueEvent::CurrentChanged {
                track_id: track.id.clone(),
                index,
            })));
        }
        effects.push(Effect::Emit(CoreEvent::Playback(PlaybackEvent::Loading {
            track_id: track.id.clone(),
            generation,
        })));

        info!(track_id = %track.id, generation, ?mode, "Loading track");

        self.state.duration_ms = track.duration_ms;
        self.state.current = Some(track.clone());
        self.state.queue = queue.clone();
        self.state.status = PlaybackStatus::Loading;
        self.state.is_playing = true;
        self.state.position_ms = 0;
        self.state.error = None;

        self.native_queue_synced = false;
        self.confirmed_playing = false;
        self.toggle_seq += 1;
        self.confirmed_toggle_seq = self.toggle_seq;
        self.confirmed_position_ms = 0;
        self.seek_seq += 1;
        self.seek_in_flight = false;
        self.pending_seek_ms = None;

        effects.push(Effect::Load {
            generation,
            request: LoadRequest { track, queue, mode },
        });
    }

    /// `target == None` toggles.
    fn request_playing(&mut self, target: Option<bool>, effects: &mut Vec<Effect>) {
        let Some(current) = self.state.current.clone() else {
            debug!("Play/pause ignored: nothing loaded");
            return;
        };

        match self.state.status {
            PlaybackStatus::Loading => {
                // Applied once the load completes.
                let playing = target.unwrap_or(!self.state.is_playing);
                self.state.is_playing = playing;
                debug!(track_id = %current.id, playing, "Play state deferred until loaded");
            }
            PlaybackStatus::Idle => {
                // Queue ran out; resuming restarts the retained track.
                if target != Some(false) {
                    let queue = self.state.queue.clone();
                    self.start_load(current, queue, LoadMode::Configure, false, effects);
                }
            }
            PlaybackStatus::Ready | PlaybackStatus::Error => {
                let playing = target.unwrap_or(!self.state.is_playing);
                if target.is_some() && playing == self.state.is_playing {
                    return;
                }
                self.toggle_seq += 1;
                self.state.is_playing = playing;
                debug!(track_id = %current.id, playing, seq = self.toggle_seq, "Requesting play state");
                effects.push(Effect::Transport {
                    generation: self.generation,
                    command: TransportCommand::SetPlaying {
                        seq: self.toggle_seq,
                        playing,
                    },
                });
            }
        }
    }

    fn step(&mut self, forward: bool, effects: &mut Vec<Effect>) {
        let Some(current_id) = self.state.current_id().map(str::to_owned) else {
            debug!(forward, "Skip ignored: nothing loaded");
            return;
        };
        let Some(current_index) = queue::index_of(&self.state.queue, &current_id) else {
            debug!(track_id = %current_id, "Skip ignored: current track not in queue");
            return;
        };

        let wrap = self.state.repeat == RepeatMode::Queue;
        let target = if forward {
            queue::next_index(&self.state.queue, &current_id, wrap)
        } else {
            queue::previous_index(&self.state.queue, &current_id, wrap)
        };
        let Some(index) = target else {
            debug!(track_id = %current_id, forward, "Skip ignored: end of queue");
            return;
        };

        let adjacent = if forward {
            index == current_index + 1
        } else {
            index + 1 == current_index
        };
        let mode = match (self.native_queue_synced && adjacent, forward) {
            (true, true) => LoadMode::SkipNext,
            (true, false) => LoadMode::SkipPrevious,
            (false, _) => LoadMode::Configure,
        };

        let track = self.state.queue[index].clone();
        let queue = self.state.queue.clone();
        self.start_load(track, queue, mode, false, effects);
    }

    fn seek(&mut self, position_ms: i64, effects: &mut Vec<Effect>) {
        let Some(track_id) = self.state.current_id().map(str::to_owned) else {
            let err = PlaybackError::InvalidCommand("seek without a loaded track".to_string());
            debug!(error = %err, "Seek ignored");
            return;
        };

        let mut target = u64::try_from(position_ms).unwrap_or(0);
        if let Some(duration) = self.state.duration_ms {
            target = target.min(duration);
        }
        self.state.position_ms = target;

        if self.state.status == PlaybackStatus::Loading {
            debug!(track_id = %track_id, position_ms = target, "Deferring seek until load completes");
            self.pending_seek_ms = Some(target);
            return;
        }

        self.issue_seek(target, effects);
    }

    fn issue_seek(&mut self, position_ms: u64, effects: &mut Vec<Effect>) {
        self.seek_seq += 1;
        self.seek_in_flight = true;
        effects.push(Effect::Transport {
            generation: self.generation,
            command: TransportCommand::Seek {
                seq: self.seek_seq,
                position_ms,
            },
        });
    }

    fn stop(&mut self, effects: &mut Vec<Effect>) {
        let track_id = self.state.current_id().map(str::to_owned);
        info!(track_id = ?track_id, "Stopping playback");

        // Invalidates in-flight loads and position samples.
        self.generation += 1;

        self.state.current = None;
        self.state.queue.clear();
        self.state.is_playing = false;
        self.state.position_ms = 0;
        self.state.duration_ms = None;
        self.state.status = PlaybackStatus::Idle;
        self.state.error = None;

        self.native_queue_synced = false;
        self.confirmed_playing = false;
        self.toggle_seq += 1;
        self.confirmed_toggle_seq = self.toggle_seq;
        self.confirmed_position_ms = 0;
        self.seek_in_flight = false;
        self.pending_seek_ms = None;

        effects.push(Effect::Transport {
            generation: self.generation,
            command: TransportCommand::Stop,
        });
        effects.push(Effect::Emit(CoreEvent::Playback(PlaybackEvent::Stopped {
            track_id,
        })));
        effects.push(Effect::Emit(CoreEvent::Queue(QueueEvent::Cleared)));
    }

    // ------------------------------------------------------------------------
    // Native events
    // ------------------------------------------------------------------------

    fn on_native_event(&mut self, event: NativeEvent, now_ms: i64, effects: &mut Vec<Effect>) {
        match event {
            NativeEvent::Remote { command } => {
                debug!(?command, "Remote command");
                self.on_command(command.into(), effects);
            }
            NativeEvent::PositionUpdate { position_ms } => {
                self.on_position(position_ms, None, now_ms, effects);
            }
            NativeEvent::PlaybackStateChange { playing } => {
                self.on_native_playing(playing, effects);
            }
            NativeEvent::Error { error } => self.on_native_error(error, effects),
            NativeEvent::QueueEnded => {
                if self.state.status == PlaybackStatus::Ready
                    && self.ended_generation != Some(self.generation)
                {
                    debug!("Native queue ended");
                    self.finish_track(now_ms, effects);
                }
            }
        }
    }

    fn on_native_playing(&mut self, playing: bool, effects: &mut Vec<Effect>) {
        let Some(track_id) = self.state.current_id().map(str::to_owned) else {
            return;
        };

        match self.state.status {
            // The load result decides.
            PlaybackStatus::Loading => return,
            PlaybackStatus::Ready => {}
            PlaybackStatus::Error | PlaybackStatus::Idle => {
                if !playing {
                    return;
                }
                info!(track_id = %track_id, "Native player resumed; recovering");
                self.state.status = PlaybackStatus::Ready;
                self.state.error = None;
            }
        }

        let changed = playing != self.confirmed_playing;
        self.state.is_playing = playing;
        self.confirmed_playing = playing;
        self.toggle_seq += 1;
        self.confirmed_toggle_seq = self.toggle_seq;

        if changed {
            effects.push(Effect::Emit(self.play_state_event(playing)));
        }
    }

    fn on_native_error(&mut self, error: BridgeError, effects: &mut Vec<Effect>) {
        match self.state.status {
            PlaybackStatus::Loading => {
                debug!(error = %error, "Native error ignored while loading");
            }
            PlaybackStatus::Idle if self.state.current.is_none() => {
                debug!(error = %error, "Native error ignored: nothing loaded");
            }
            _ => self.fail(PlaybackError::NativeBackend(error), effects),
        }
    }

    fn on_position(
        &mut self,
        position_ms: u64,
        duration_ms: Option<u64>,
        now_ms: i64,
        effects: &mut Vec<Effect>,
    ) {
        if self.state.status != PlaybackStatus::Ready {
            return;
        }
        let Some(track_id) = self.state.current_id().map(str::to_owned) else {
            return;
        };

        if let Some(duration) = duration_ms.filter(|d| *d > 0) {
            self.state.duration_ms = Some(duration);
        }
        self.confirmed_position_ms = position_ms;
        if !self.seek_in_flight && self.state.position_ms != position_ms {
            self.state.position_ms = position_ms;
            if let Some(duration) = self.state.duration_ms {
                effects.push(Effect::Emit(CoreEvent::Playback(
                    PlaybackEvent::PositionChanged {
                        track_id,
                        position_ms,
                        duration_ms: duration,
                    },
                )));
            }
        }

        if self.reached_end(position_ms) && self.can_end(now_ms) {
            self.finish_track(now_ms, effects);
        }
    }

    fn reached_end(&self, position_ms: u64) -> bool {
        if self.state.repeat == RepeatMode::Track && self.native_repeat == RepeatMode::Track {
            return false;
        }
        match self.state.duration_ms {
            Some(duration) if duration > 0 => {
                position_ms.saturating_add(self.settings.end_of_track_epsilon_ms) >= duration
            }
            _ => false,
        }
    }

    /// At most once per generation, and never twice within the re-entry guard.
    fn can_end(&self, now_ms: i64) -> bool {
        if self.ended_generation == Some(self.generation) {
            return false;
        }
        let guard = i64::try_from(self.settings.end_reentry_guard_ms).unwrap_or(i64::MAX);
        self.last_ended_at_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= guard)
    }

    fn finish_track(&mut self, now_ms: i64, effects: &mut Vec<Effect>) {
        let Some(track_id) = self.state.current_id().map(str::to_owned) else {
            return;
        };
        self.ended_generation = Some(self.generation);
        self.last_ended_at_ms = Some(now_ms);

        info!(track_id = %track_id, generation = self.generation, "Track ended");
        effects.push(Effect::Emit(CoreEvent::Playback(PlaybackEvent::Completed {
            track_id: track_id.clone(),
        })));

        let target = match self.state.repeat {
            RepeatMode::Track => queue::index_of(&self.state.queue, &track_id),
            RepeatMode::Queue => queue::next_index(&self.state.queue, &track_id, true),
            RepeatMode::Off => queue::next_index(&self.state.queue, &track_id, false),
        };

        match target {
            Some(index) => {
                // A fresh configure is idempotent even if the native player
                // already advanced on its own.
                let track = self.state.queue[index].clone();
                let queue = self.state.queue.clone();
                self.start_load(track, queue, LoadMode::Configure, false, effects);
            }
            None => {
                info!(track_id = %track_id, "Queue finished");
                self.state.status = PlaybackStatus::Idle;
                self.state.is_playing = false;
                self.confirmed_playing = false;
                self.toggle_seq += 1;
                self.confirmed_toggle_seq = self.toggle_seq;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Native call results
    // ------------------------------------------------------------------------

    fn on_load_completed(
        &mut self,
        generation: u64,
        result: Result<LoadOutcome, BridgeError>,
        effects: &mut Vec<Effect>,
    ) {
        if generation != self.generation || self.state.status != PlaybackStatus::Loading {
            debug!(generation, current = self.generation, "Discarding superseded load result");
            return;
        }
        let Some(track) = self.state.current.clone() else {
            return;
        };

        match result {
            Ok(outcome) => {
                info!(track_id = %track.id, generation, "Track ready");
                self.state.status = PlaybackStatus::Ready;
                self.confirmed_playing = true;
                self.native_queue_synced = true;
                if outcome.duration_ms.is_some_and(|d| d > 0) {
                    self.state.duration_ms = outcome.duration_ms;
                }
                effects.push(Effect::Emit(CoreEvent::Playback(PlaybackEvent::Started {
                    track_id: track.id.clone(),
                    title: track.title.clone(),
                })));

                if !self.state.is_playing {
                    self.toggle_seq += 1;
                    debug!(
                        track_id = %track.id,
                        seq = self.toggle_seq,
                        "Applying pause requested while loading"
                    );
                    effects.push(Effect::Transport {
                        generation,
                        command: TransportCommand::SetPlaying {
                            seq: self.toggle_seq,
                            playing: false,
                        },
                    });
                }
                if let Some(position_ms) = self.pending_seek_ms.take() {
                    self.issue_seek(position_ms, effects);
                }
            }
            Err(source) => {
                self.fail(
                    PlaybackError::LoadFailed {
                        track_id: track.id,
                        source,
                    },
                    effects,
                );
            }
        }
    }

    fn on_transport_completed(
        &mut self,
        generation: u64,
        command: TransportCommand,
        result: Result<(), BridgeError>,
        effects: &mut Vec<Effect>,
    ) {
        match command {
            TransportCommand::Stop => {
                if let Err(error) = result {
                    warn!(error = %error, "Native stop failed");
                }
            }
            TransportCommand::SetRepeatMode(mode) => match result {
                Ok(()) => self.native_repeat = mode,
                Err(error) => {
                    warn!(?mode, error = %error, "Native repeat mode not applied");
                }
            },
            _ if generation != self.generation => {
                debug!(generation, current = self.generation, "Dropping stale acknowledgement");
            }
            TransportCommand::SetPlaying { seq, playing } => {
                self.on_playing_ack(seq, playing, result, effects)
            }
            TransportCommand::Seek { seq, position_ms } => {
                self.on_seek_ack(seq, position_ms, result, effects)
            }
        }
    }

    fn on_playing_ack(
        &mut self,
        seq: u64,
        playing: bool,
        result: Result<(), BridgeError>,
        effects: &mut Vec<Effect>,
    ) {
        match result {
            Ok(()) => {
                if seq <= self.confirmed_toggle_seq {
                    return;
                }
                let changed = playing != self.confirmed_playing;
                self.confirmed_toggle_seq = seq;
                self.confirmed_playing = playing;

                if seq == self.toggle_seq
                    && playing
                    && self.state.status == PlaybackStatus::Error
                {
                    info!("Playback recovered after resume");
                    self.state.status = PlaybackStatus::Ready;
                    self.state.error = None;
                }
                if changed {
                    effects.push(Effect::Emit(self.play_state_event(playing)));
                }
            }
            Err(error) => {
                if seq != self.toggle_seq {
                    debug!(seq, error = %error, "Ignoring failure of superseded toggle");
                    return;
                }
                warn!(playing, error = %error, "Play state change failed; rolling back");
                self.state.is_playing = self.confirmed_playing;
                effects.push(self.command_error_event(PlaybackError::NativeBackend(error)));
            }
        }
    }

    fn on_seek_ack(
        &mut self,
        seq: u64,
        position_ms: u64,
        result: Result<(), BridgeError>,
        effects: &mut Vec<Effect>,
    ) {
        if seq != self.seek_seq {
            return;
        }
        self.seek_in_flight = false;

        match result {
            Ok(()) => {
                self.confirmed_position_ms = position_ms;
                if let Some(track_id) = self.state.current_id() {
                    effects.push(Effect::Emit(CoreEvent::Playback(PlaybackEvent::Seeked {
                        track_id: track_id.to_string(),
                        position_ms,
                    })));
                }
            }
            Err(error) => {
                warn!(position_ms, error = %error, "Seek failed; rolling back");
                self.state.position_ms = self.confirmed_position_ms;
                effects.push(self.command_error_event(PlaybackError::NativeBackend(error)));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn fail(&mut self, error: PlaybackError, effects: &mut Vec<Effect>) {
        let track_id = self.state.current_id().map(str::to_owned);
        warn!(track_id = ?track_id, error = %error, "Playback failed");

        self.state.status = PlaybackStatus::Error;
        self.state.is_playing = false;
        self.state.error = Some(PlaybackFailure::from(&error));
        self.native_queue_synced = false;
        self.confirmed_playing = false;
        self.toggle_seq += 1;
        self.confirmed_toggle_seq = self.toggle_seq;
        self.seek_in_flight = false;
        self.pending_seek_ms = None;

        effects.push(Effect::Emit(CoreEvent::Playback(PlaybackEvent::Error {
            track_id,
            reason: failure_reason(&error),
            message: error.to_string(),
            recoverable: error.is_transient(),
        })));
    }

    fn command_error_event(&self, error: PlaybackError) -> Effect {
        Effect::Emit(CoreEvent::Playback(PlaybackEvent::Error {
            track_id: self.state.current_id().map(str::to_owned),
            reason: failure_reason(&error),
            message: error.to_string(),
            recoverable: error.is_transient(),
        }))
    }

    fn play_state_event(&self, playing: bool) -> CoreEvent {
        let track_id = self.state.current_id().unwrap_or_default().to_string();
        let position_ms = self.state.position_ms;
        CoreEvent::Playback(if playing {
            PlaybackEvent::Resumed {
                track_id,
                position_ms,
            }
        } else {
            PlaybackEvent::Paused {
                track_id,
                position_ms,
            }
        })
    }

    /// Poll only while a track is ready and somebody can see it.
    fn sync_polling(&mut self, effects: &mut Vec<Effect>) {
        let wanted = (self.state.status == PlaybackStatus::Ready && self.foreground)
            .then_some(self.generation);

        if wanted == self.polling_generation {
            return;
        }
        if self.polling_generation.is_some() {
            effects.push(Effect::StopPolling);
        }
        if let Some(generation) = wanted {
            effects.push(Effect::StartPolling { generation });
        }
        self.polling_generation = wanted;
    }
}

/// `loadFailed` for load errors, the native reason code otherwise.
fn failure_reason(error: &PlaybackError) -> String {
    match error {
        PlaybackError::LoadFailed { .. } => error.code().to_string(),
        other => other
            .native_reason()
            .map(|reason| reason.to_string())
            .unwrap_or_else(|| other.code().to_string()),
    }
}
