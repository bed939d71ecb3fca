//! # Playback Controller
//!
//! The single "now playing" session shared by every screen.
//!
//! ## Architecture
//!
//! ```text
//!  UI commands ──┐
//!  remote intents┤                 ┌──────────────────────┐
//!  native events ┼──> mailbox ───> │ controller task      │──> watch<PlaybackState>
//!  lifecycle     ┤   (mpsc)        │  PlayerCore::handle  │──> EventBus<CoreEvent>
//!  load / ack /  ┘                 └──────────┬───────────┘
//!  poll results                               │ effects
//!        ^                         ┌──────────┴──────────┐
//!        │                         v                     v
//!        ├──────────────── native worker          position poller
//!        └───────────────────────────────────────────────┘
//! ```
//!
//! Every mutation happens inside one task that handles one message at a time,
//! so there is no locking around the state. Native calls never run on that
//! task. Loads and transport commands go through one ordered native worker,
//! so the platform sees them in the order they were issued, and every result
//! comes back through the mailbox tagged with the generation it belongs to.
//!
//! The worker shares the current generation with the controller task. A load
//! or play/seek command whose generation is already stale is cut short before
//! its next native call, so a `stop()` or a newer load queued behind it is
//! always the last word on the native side.
//!
//! [`PlaybackController`] is a cheap, cloneable handle. The task ends on
//! [`PlaybackController::shutdown`] or when the last handle is dropped.

use crate::adapter::NativeBackendAdapter;
use crate::error::{PlaybackError, Result};
use crate::machine::{Effect, Input, LoadRequest, PlayerCommand, PlayerCore, TransportCommand};
use crate::poller::PositionPoller;
use crate::types::{PlaybackState, Track};
use bridge_traits::{
    Clock, LifecycleChangeStream, LifecycleState, NativeEventReceiver, RepeatMode,
};
use core_async::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use core_async::sync::{oneshot, watch};
use core_async::time::Duration;
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

enum Message {
    Input(Input),
    Shutdown(oneshot::Sender<()>),
}

/// Work for the native worker, tagged with the generation that issued it.
enum NativeCommand {
    Load {
        generation: u64,
        request: LoadRequest,
    },
    Transport {
        generation: u64,
        command: TransportCommand,
    },
}

type Mailbox = WeakUnboundedSender<Message>;

/// Handle to the playback session.
///
/// Commands are fire-and-forget: they are queued on the controller's mailbox
/// and applied in order. Observe the outcome through [`snapshot`](Self::snapshot),
/// [`subscribe`](Self::subscribe) or [`events`](Self::events).
///
/// # Example
///
/// ```ignore
/// let controller = PlaybackController::spawn(config).await?;
/// controller.load_and_play(track, Some(queue))?;
///
/// let mut state = controller.subscribe();
/// state.wait_for(|s| s.status == PlaybackStatus::Ready).await?;
/// controller.toggle()?;
/// ```
#[derive(Clone)]
pub struct PlaybackController {
    mailbox: UnboundedSender<Message>,
    state: watch::Receiver<PlaybackState>,
    events: EventBus,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("closed", &self.mailbox.is_closed())
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl PlaybackController {
    /// Set up the native player and start the controller task.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Config`] if the configuration is invalid
    /// - [`PlaybackError::NativeBackend`] if the native audio session cannot be set up
    #[instrument(skip(config))]
    pub async fn spawn(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let adapter = NativeBackendAdapter::new(Arc::clone(&config.native_player));
        adapter.setup().await?;
        let native_events = adapter.attach_events();

        let (mailbox, inbox) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PlaybackState::default());
        let events = EventBus::new(config.event_buffer_size);
        let (native_tx, native_rx) = mpsc::unbounded_channel();
        let current_generation = Arc::new(AtomicU64::new(0));

        forward_native_events(native_events, mailbox.downgrade());
        run_native_worker(
            adapter.clone(),
            native_rx,
            Arc::clone(&current_generation),
            mailbox.downgrade(),
        );

        if let Some(observer) = config.lifecycle_observer.as_ref() {
            match observer.get_state().await {
                Ok(lifecycle) if !lifecycle.is_active() => {
                    let _ = mailbox.send(Message::Input(Input::Lifecycle(lifecycle)));
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "Could not read lifecycle state; assuming foreground"),
            }
            match observer.subscribe_changes().await {
                Ok(stream) => forward_lifecycle(stream, mailbox.downgrade()),
                Err(err) => warn!(error = %err, "Lifecycle changes unavailable; polling stays on"),
            }
        }

        if config.playback.default_repeat != RepeatMode::Off {
            let command = PlayerCommand::SetRepeatMode(config.playback.default_repeat);
            let _ = mailbox.send(Message::Input(Input::Command(command)));
        }

        let task = ControllerTask {
            core: PlayerCore::new(config.playback),
            adapter,
            clock: Arc::clone(&config.clock),
            poll_interval: config.playback.poll_interval(),
            inbox,
            mailbox: mailbox.downgrade(),
            native: native_tx,
            current_generation,
            state: state_tx,
            events: events.clone(),
            poller: None,
        };
        core_async::spawn(task.run());

        info!(
            poll_interval_ms = config.playback.poll_interval_ms,
            "Playback controller started"
        );

        Ok(Self {
            mailbox,
            state: state_rx,
            events,
        })
    }

    fn send(&self, input: Input) -> Result<()> {
        self.mailbox
            .send(Message::Input(input))
            .map_err(|_| PlaybackError::ControllerClosed)
    }

    fn command(&self, command: PlayerCommand) -> Result<()> {
        self.send(Input::Command(command))
    }

    /// Make `track` current and start it.
    ///
    /// `queue` defaults to `[track]`; `track` is prepended when the queue does
    /// not contain it. Supersedes any load still in flight.
    pub fn load_and_play(&self, track: Track, queue: Option<Vec<Track>>) -> Result<()> {
        self.command(PlayerCommand::LoadAndPlay { track, queue })
    }

    /// Pause when playing, resume otherwise. No-op without a track.
    pub fn toggle(&self) -> Result<()> {
        self.command(PlayerCommand::Toggle)
    }

    pub fn play(&self) -> Result<()> {
        self.command(PlayerCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.command(PlayerCommand::Pause)
    }

    pub fn next(&self) -> Result<()> {
        self.command(PlayerCommand::Next)
    }

    pub fn previous(&self) -> Result<()> {
        self.command(PlayerCommand::Previous)
    }

    /// Seek within the current track. The position is clamped to the track.
    pub fn seek(&self, position_ms: i64) -> Result<()> {
        self.command(PlayerCommand::Seek { position_ms })
    }

    /// Stop playback and clear the session.
    pub fn stop(&self) -> Result<()> {
        self.command(PlayerCommand::Stop)
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.command(PlayerCommand::SetRepeatMode(mode))
    }

    /// Report an app lifecycle transition. Polling pauses outside the foreground.
    pub fn set_lifecycle_state(&self, lifecycle: LifecycleState) -> Result<()> {
        self.send(Input::Lifecycle(lifecycle))
    }

    /// Latest committed state.
    pub fn snapshot(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    /// Watch the state. Observers always see the latest committed value.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Discrete playback and queue events emitted from now on.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }

    /// Stop polling and end the controller task. Idempotent.
    ///
    /// Commands issued afterwards fail with [`PlaybackError::ControllerClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        if self.mailbox.send(Message::Shutdown(reply)).is_err() {
            return Ok(());
        }
        let _ = done.await;
        Ok(())
    }
}

struct ControllerTask {
    core: PlayerCore,
    adapter: NativeBackendAdapter,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    inbox: UnboundedReceiver<Message>,
    mailbox: Mailbox,
    native: UnboundedSender<NativeCommand>,
    current_generation: Arc<AtomicU64>,
    state: watch::Sender<PlaybackState>,
    events: EventBus,
    poller: Option<PositionPoller>,
}

impl ControllerTask {
    async fn run(mut self) {
        while let Some(message) = self.inbox.recv().await {
            match message {
                Message::Input(input) => self.dispatch(input),
                Message::Shutdown(reply) => {
                    self.inbox.close();
                    self.stop_polling();
                    info!("Playback controller shut down");
                    let _ = reply.send(());
                    return;
                }
            }
        }
        self.stop_polling();
        debug!("All controller handles dropped");
    }

    fn dispatch(&mut self, input: Input) {
        let now_ms = self.clock.unix_timestamp_millis();
        let effects = self.core.handle(input, now_ms);
        // Published before any effect reaches the worker.
        self.current_generation
            .store(self.core.generation(), Ordering::SeqCst);

        let snapshot = self.core.state();
        self.state.send_if_modified(|current| {
            if *current == *snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });

        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Load {
                generation,
                request,
            } => self.submit(NativeCommand::Load {
                generation,
                request,
            }),
            Effect::Transport {
                generation,
                command,
            } => self.submit(NativeCommand::Transport {
                generation,
                command,
            }),
            Effect::StartPolling { generation } => {
                self.stop_polling();
                let mailbox = self.mailbox.clone();
                self.poller = Some(PositionPoller::start(
                    self.adapter.clone(),
                    generation,
                    self.poll_interval,
                    move |generation, sample| {
                        deliver(&mailbox, Input::PositionSampled { generation, sample })
                    },
                ));
            }
            Effect::StopPolling => self.stop_polling(),
            Effect::Emit(event) => {
                // No subscribers is fine.
                let _ = self.events.emit(event);
            }
        }
    }

    fn submit(&self, command: NativeCommand) {
        if self.native.send(command).is_err() {
            warn!("Native worker stopped; command dropped");
        }
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }
}

/// Post `input` to the controller. `false` once the controller is gone.
fn deliver(mailbox: &Mailbox, input: Input) -> bool {
    mailbox
        .upgrade()
        .is_some_and(|sender| sender.send(Message::Input(input)).is_ok())
}

fn forward_native_events(mut events: NativeEventReceiver, mailbox: Mailbox) {
    core_async::spawn(async move {
        while let Some(event) = events.recv().await {
            if !deliver(&mailbox, Input::Native(event)) {
                break;
            }
        }
        debug!("Native event forwarding ended");
    });
}

fn forward_lifecycle(mut changes: Box<dyn LifecycleChangeStream>, mailbox: Mailbox) {
    core_async::spawn(async move {
        while let Some(lifecycle) = changes.next().await {
            if !deliver(&mailbox, Input::Lifecycle(lifecycle)) {
                break;
            }
        }
        debug!("Lifecycle forwarding ended");
    });
}

/// Native commands run one after another so that loads, pause/play/seek and
/// stop reach the platform in the order they were issued.
fn run_native_worker(
    adapter: NativeBackendAdapter,
    mut commands: UnboundedReceiver<NativeCommand>,
    current_generation: Arc<AtomicU64>,
    mailbox: Mailbox,
) {
    core_async::spawn(async move {
        while let Some(command) = commands.recv().await {
            let is_current =
                |generation: u64| current_generation.load(Ordering::SeqCst) == generation;

            let completed = match command {
                NativeCommand::Load {
                    generation,
                    request,
                } => match adapter.load(&request, || is_current(generation)).await {
                    Ok(Some(outcome)) => Input::LoadCompleted {
                        generation,
                        result: Ok(outcome),
                    },
                    Ok(None) => continue,
                    Err(err) => Input::LoadCompleted {
                        generation,
                        result: Err(err),
                    },
                },
                NativeCommand::Transport {
                    generation,
                    command,
                } => {
                    if command.is_generation_bound() && !is_current(generation) {
                        debug!(?command, generation, "Skipping superseded native command");
                        continue;
                    }
                    let result = adapter.execute(command).await;
                    if let Err(err) = &result {
                        debug!(?command, error = %err, "Native command failed");
                    }
                    Input::TransportCompleted {
                        generation,
                        command,
                        result,
                    }
                }
            };

            if !deliver(&mailbox, completed) {
                break;
            }
        }
    });
}
