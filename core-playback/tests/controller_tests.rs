//! End-to-end controller tests against a scripted native player.
//!
//! The scripted player records every native call (configure is recorded when
//! it starts and again when it completes), lets a test hold a track's load
//! open until it is released, and exposes the event sink so native events and
//! remote intents can be injected.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, LifecycleChangeStream, LifecycleObserver, LifecycleState, ManualClock, MediaItem,
    NativeErrorReason, NativeEvent, NativeEventSink, NativePlayer, RemoteCommand, RepeatMode,
};
use core_playback::{PlaybackController, PlaybackError, PlaybackState, PlaybackStatus, Track};
use core_runtime::config::{CoreConfig, PlaybackSettings};
use core_runtime::events::{CoreEvent, PlaybackEvent, QueueEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};

const TRACK_MS: u64 = 180_000;
const WAIT: Duration = Duration::from_secs(3);

#[derive(Default)]
struct ScriptedPlayer {
    calls: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<BridgeResult<()>>>>,
    sink: Mutex<Option<NativeEventSink>>,
    position_ms: AtomicU64,
    position_queries: AtomicUsize,
    fail_setup: AtomicBool,
    fail_pause: AtomicBool,
}

impl ScriptedPlayer {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Hold the next configure of `track_id` until the returned sender fires.
    fn gate(&self, track_id: &str) -> oneshot::Sender<BridgeResult<()>> {
        let (release, gate) = oneshot::channel();
        self.gates.lock().unwrap().insert(track_id.to_string(), gate);
        release
    }

    fn emit(&self, event: NativeEvent) {
        let sink = self.sink.lock().unwrap().clone();
        assert!(sink.expect("events attached").emit(event));
    }

    fn set_position(&self, position_ms: u64) {
        self.position_ms.store(position_ms, Ordering::SeqCst);
    }

    /// Calls recorded after the first occurrence of `call`.
    fn calls_after(&self, call: &str) -> Vec<String> {
        let calls = self.calls();
        let start = calls
            .iter()
            .position(|c| c == call)
            .unwrap_or_else(|| panic!("`{call}` never called: {calls:?}"));
        calls[start + 1..].to_vec()
    }

    /// Track the native player ended up configured with.
    fn last_configured(&self) -> Option<String> {
        self.calls()
            .iter()
            .rev()
            .find_map(|c| c.strip_prefix("configured:").map(str::to_owned))
    }
}

#[async_trait]
impl NativePlayer for ScriptedPlayer {
    async fn setup(&self) -> BridgeResult<()> {
        self.record("setup");
        if self.fail_setup.load(Ordering::SeqCst) {
            return Err(BridgeError::DeviceBusy("session in use".into()));
        }
        Ok(())
    }

    fn attach_events(&self, sink: NativeEventSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    async fn configure(&self, item: MediaItem, _queue: Vec<MediaItem>) -> BridgeResult<()> {
        self.record(format!("configure:{}", item.id));
        let gate = self.gates.lock().unwrap().remove(&item.id);
        if let Some(gate) = gate {
            gate.await
                .unwrap_or_else(|_| Err(BridgeError::Unknown("gate dropped".into())))?;
        }
        self.record(format!("configured:{}", item.id));
        self.set_position(0);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play");
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause");
        if self.fail_pause.load(Ordering::SeqCst) {
            return Err(BridgeError::DeviceBusy("route change".into()));
        }
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        let position_ms = u64::try_from(position.as_millis()).unwrap_or(u64::MAX);
        self.record(format!("seek:{position_ms}"));
        self.set_position(position_ms);
        Ok(())
    }

    async fn skip_next(&self) -> BridgeResult<()> {
        self.record("skip_next");
        self.set_position(0);
        Ok(())
    }

    async fn skip_previous(&self) -> BridgeResult<()> {
        self.record("skip_previous");
        self.set_position(0);
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record("stop");
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        self.position_queries.fetch_add(1, Ordering::SeqCst);
        Ok(Duration::from_millis(self.position_ms.load(Ordering::SeqCst)))
    }

    async fn duration(&self) -> BridgeResult<Option<Duration>> {
        Ok(Some(Duration::from_millis(TRACK_MS)))
    }
}

struct ChannelLifecycle {
    initial: LifecycleState,
    changes: Mutex<Option<mpsc::UnboundedReceiver<LifecycleState>>>,
}

struct ChannelLifecycleStream(mpsc::UnboundedReceiver<LifecycleState>);

#[async_trait]
impl LifecycleChangeStream for ChannelLifecycleStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        self.0.recv().await
    }
}

#[async_trait]
impl LifecycleObserver for ChannelLifecycle {
    async fn get_state(&self) -> BridgeResult<LifecycleState> {
        Ok(self.initial)
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn LifecycleChangeStream>> {
        let changes = self
            .changes
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BridgeError::Unsupported("single subscriber".into()))?;
        Ok(Box::new(ChannelLifecycleStream(changes)))
    }
}

fn track(id: &str) -> Track {
    Track::new(id, format!("Session {id}"), format!("https://cdn.example.com/{id}.m4a"))
        .with_duration_ms(TRACK_MS)
}

fn settings() -> PlaybackSettings {
    PlaybackSettings::default().with_poll_interval_ms(20)
}

async fn spawn_with(player: Arc<ScriptedPlayer>, clock: Arc<ManualClock>) -> PlaybackController {
    let config = CoreConfig::builder()
        .native_player(player)
        .clock(clock)
        .playback(settings())
        .build()
        .unwrap();
    PlaybackController::spawn(config).await.unwrap()
}

async fn spawn(player: Arc<ScriptedPlayer>) -> PlaybackController {
    spawn_with(player, Arc::new(ManualClock::new(1_000_000))).await
}

async fn wait_until<F>(controller: &PlaybackController, predicate: F) -> PlaybackState
where
    F: FnMut(&PlaybackState) -> bool,
{
    let mut state = controller.subscribe();
    let matched = timeout(WAIT, state.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("controller closed");
    matched.clone()
}

async fn wait_ready(controller: &PlaybackController, id: &str) -> PlaybackState {
    wait_until(controller, |s| {
        s.status == PlaybackStatus::Ready && s.current_id() == Some(id)
    })
    .await
}

async fn wait_for_call(player: &ScriptedPlayer, call: &str, times: usize) {
    timeout(WAIT, async {
        while player.count(call) < times {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("`{call}` not called {times} time(s): {:?}", player.calls()));
}

/// Let queued messages and native calls settle.
async fn settle() {
    sleep(Duration::from_millis(80)).await;
}

#[tokio::test]
async fn test_load_reports_loading_then_ready() {
    let player = ScriptedPlayer::new();
    let release = player.gate("t1");
    let controller = spawn(player.clone()).await;
    let mut events = controller.events();

    controller
        .load_and_play(track("t1"), Some(vec![track("t1"), track("t2")]))
        .unwrap();

    let loading = wait_until(&controller, |s| s.status == PlaybackStatus::Loading).await;
    assert_eq!(loading.current_id(), Some("t1"));
    assert!(loading.is_playing);
    assert_eq!(loading.position_ms, 0);
    assert_eq!(loading.queue.len(), 2);

    release.send(Ok(())).unwrap();
    let ready = wait_ready(&controller, "t1").await;
    assert!(ready.is_playing);
    assert_eq!(ready.duration_ms, Some(TRACK_MS));
    assert!(ready.error.is_none());

    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Queue(QueueEvent::Replaced { current_index: Some(0), .. })
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Playback(PlaybackEvent::Loading { .. })
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Playback(PlaybackEvent::Started { track_id, .. }) if track_id == "t1"
    ));
}

#[tokio::test]
async fn test_next_moves_through_queue_and_stops_at_end() {
    let player = ScriptedPlayer::new();
    let controller = spawn(player.clone()).await;

    controller
        .load_and_play(track("t1"), Some(vec![track("t1"), track("t2")]))
        .unwrap();
    wait_ready(&controller, "t1").await;

    controller.next().unwrap();
    let state = wait_ready(&controller, "t2").await;
    assert_eq!(state.position_ms, 0);
    assert_eq!(player.count("skip_next"), 1);

    controller.next().unwrap();
    settle().await;
    let state = controller.snapshot();
    assert_eq!(state.current_id(), Some("t2"));
    assert_eq!(state.status, PlaybackStatus::Ready);
    assert_eq!(player.count("skip_next"), 1);

    controller.previous().unwrap();
    wait_ready(&controller, "t1").await;
    assert_eq!(player.count("skip_previous"), 1);
}

#[tokio::test]
async fn test_superseded_load_never_overrides_newer_track() {
    for release_newer_first in [true, false] {
        let player = ScriptedPlayer::new();
        let release_a = player.gate("a");
        let release_b = player.gate("b");
        let controller = spawn(player.clone()).await;

        controller.load_and_play(track("a"), None).unwrap();
        controller.load_and_play(track("b"), None).unwrap();
        wait_for_call(&player, "configure:a", 1).await;

        if release_newer_first {
            release_b.send(Ok(())).unwrap();
            settle().await;
            assert_eq!(controller.snapshot().status, PlaybackStatus::Loading);
            release_a.send(Ok(())).unwrap();
        } else {
            release_a.send(Ok(())).unwrap();
            wait_for_call(&player, "configure:b", 1).await;
            assert_eq!(controller.snapshot().status, PlaybackStatus::Loading);
            release_b.send(Ok(())).unwrap();
        }

        wait_ready(&controller, "b").await;
        settle().await;
        let state = controller.snapshot();
        assert_eq!(
            state.current_id(),
            Some("b"),
            "release_newer_first = {release_newer_first}"
        );
        assert_eq!(state.status, PlaybackStatus::Ready);
        assert_eq!(state.queue.len(), 1);

        // The native side agrees with the controller and never played `a`.
        assert_eq!(player.last_configured().as_deref(), Some("b"));
        assert_eq!(player.count("play"), 1);
        assert!(player.calls_after("configured:b").contains(&"play".to_string()));
    }
}

#[tokio::test]
async fn test_failed_load_keeps_track_for_retry() {
    let player = ScriptedPlayer::new();
    let release = player.gate("t1");
    let controller = spawn(player.clone()).await;

    controller.load_and_play(track("t1"), None).unwrap();
    release
        .send(Err(BridgeError::Network("offline".into())))
        .unwrap();

    let state = wait_until(&controller, |s| s.status == PlaybackStatus::Error).await;
    assert_eq!(state.current_id(), Some("t1"));
    assert!(!state.is_playing);
    let failure = state.error.expect("failure recorded");
    assert_eq!(failure.kind, "loadFailed");
    assert!(failure.recoverable);

    controller.load_and_play(track("t1"), None).unwrap();
    let state = wait_ready(&controller, "t1").await;
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_toggle_twice_sends_two_commands_and_restores_state() {
    let player = ScriptedPlayer::new();
    let controller = spawn(player.clone()).await;

    controller.load_and_play(track("t1"), None).unwrap();
    wait_ready(&controller, "t1").await;
    let plays = player.count("play");

    controller.toggle().unwrap();
    controller.toggle().unwrap();

    wait_for_call(&player, "pause", 1).await;
    wait_for_call(&player, "play", plays + 1).await;
    settle().await;

    let calls = player.calls();
    let pause_at = calls.iter().position(|c| c == "pause").unwrap();
    let resume_at = calls.iter().rposition(|c| c == "play").unwrap();
    assert!(pause_at < resume_at, "native commands out of order: {calls:?}");
    assert!(controller.snapshot().is_playing);
}

#[tokio::test]
async fn test_failed_pause_rolls_back_without_error_status() {
    let player = ScriptedPlayer::new();
    player.fail_pause.store(true, Ordering::SeqCst);
    let controller = spawn(player.clone()).await;
    controller.load_and_play(track("t1"), None).unwrap();
    wait_ready(&controller, "t1").await;
    let mut errors = controller
        .events()
        .filter(|e| matches!(e, CoreEvent::Playback(PlaybackEvent::Error { .. })));

    controller.pause().unwrap();

    let event = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert!(matches!(
        event,
        CoreEvent::Playback(PlaybackEvent::Error { reason, .. }) if reason == "deviceBusy"
    ));
    let state = wait_until(&controller, |s| s.is_playing).await;
    assert_eq!(state.status, PlaybackStatus::Ready);
}

#[tokio::test]
async fn test_toggle_without_track_is_noop() {
    let player = ScriptedPlayer::new();
    let controller = spawn(player.clone()).await;

    controller.toggle().unwrap();
    controller.seek(5_000).unwrap();
    settle().await;

    assert_eq!(controller.snapshot(), PlaybackState::default());
    assert_eq!(player.calls(), vec!["setup".to_string()]);
}

#[tokio::test]
async fn test_seek_is_clamped_to_track_bounds() {
    let player = ScriptedPlayer::new();
    let controller = spawn(player.clone()).await;
    controller.load_and_play(track("t1"), None).unwrap();
    wait_ready(&controller, "t1").await;

    controller.seek(-50).unwrap();
    wait_for_call(&player, "seek:0", 1).await;

    controller.seek(30_000).unwrap();
    let state = wait_until(&controller, |s| s.position_ms == 30_000).await;
    assert_eq!(state.status, PlaybackStatus::Ready);

    controller.seek(999_999_999).unwrap();
    wait_for_call(&player, &format!("seek:{TRACK_MS}"), 1).await;
}

#[tokio::test]
async fn test_native_network_error_keeps_current_track() {
    let player = ScriptedPlayer::new();
    let controller = spawn(player.clone()).await;
    controller
        .load_and_play(track("t1"), Some(vec![track("t1"), track("t2")]))
        .unwrap();
    wait_ready(&controller, "t1").await;

    player.emit(NativeEvent::Error {
        error: BridgeError::Network("stream dropped".into()),
    });

    let state = wait_until(&controller, |s| s.status == PlaybackStatus::Error).await;
    assert_eq!(state.current_id(), Some("t1"));
    assert!(!state.is_playing);
    let failure = state.error.expect("failure recorded");
    assert_eq!(failure.kind, "nativeBackendError");
    assert_eq!(failure.reason, NativeErrorReason::NetworkError);

    // The native side recovering on its own clears the error.
    player.emit(NativeEvent::PlaybackStateChange { playing: true });
    let state = wait_ready(&controller, "t1").await;
    assert!(state.is_playing);
}

#[tokio::test]
async fn test_end_of_track_advances_exactly_once() {
    let player = ScriptedPlayer::new();
    let clock = Arc::new(ManualClock::new(1_000_000));
    let controller = spawn_with(player.clone(), clock.clone()).await;
    let mut completed = controller
        .events()
        .filter(|e| matches!(e, CoreEvent::Playback(PlaybackEvent::Completed { .. })));

    controller
        .load_and_play(
            track("t1"),
            Some(vec![track("t1"), track("t2"), track("t3")]),
        )
        .unwrap();
    wait_ready(&controller, "t1").await;

    player.set_position(TRACK_MS - 50);
    wait_ready(&controller, "t2").await;
    assert_eq!(player.count("configure:t2"), 1);

    // A second end inside the re-entry window is suppressed.
    player.set_position(TRACK_MS - 10);
    settle().await;
    assert_eq!(controller.snapshot().current_id(), Some("t2"));
    assert_eq!(player.count("configure:t3"), 0);

    clock.advance(1_000);
    wait_ready(&controller, "t3").await;

    assert!(timeout(WAIT, completed.recv()).await.unwrap().is_ok());
    assert!(timeout(WAIT, completed.recv()).await.unwrap().is_ok());
    assert!(completed.try_recv().is_none());
}

#[tokio::test]
async fn test_last_track_end_goes_idle_and_toggle_restarts() {
    let player = ScriptedPlayer::new();
    let controller = spawn(player.clone()).await;
    controller.load_and_play(track("t1"), None).unwrap();
    wait_ready(&controller, "t1").await;

    player.emit(NativeEvent::QueueEnded);
    let state = wait_until(&controller, |s| s.status == PlaybackStatus::Idle).await;
    assert_eq!(state.current_id(), Some("t1"));
    assert!(!state.is_playing);

    controller.toggle().unwrap();
    wait_ready(&controller, "t1").await;
    assert_eq!(player.count("configure:t1"), 2);
}

#[tokio::test]
async fn test_remote_intents_behave_like_ui_commands() {
    let player = ScriptedPlayer::new();
    let controller = spawn(player.clone()).await;
    controller
        .load_and_play(track("t1"), Some(vec![track("t1"), track("t2")]))
        .unwrap();
    wait_ready(&controller, "t1").await;

    player.emit(NativeEvent::Remote {
        command: RemoteCommand::Pause,
    });
    wait_until(&controller, |s| !s.is_playing).await;
    wait_for_call(&player, "pause", 1).await;

    player.emit(NativeEvent::Remote {
        command: RemoteCommand::Seek { position_ms: 12_000 },
    });
    wait_for_call(&player, "seek:12000", 1).await;

    player.emit(NativeEvent::Remote {
        command: RemoteCommand::Next,
    });
    wait_ready(&controller, "t2").await;

    player.emit(NativeEvent::Remote {
        command: RemoteCommand::Stop,
    });
    wait_until(&controller, |s| s.current.is_none()).await;
    wait_for_call(&player, "stop", 1).await;
}

#[tokio::test]
async fn test_stop_during_load_leaves_native_player_stopped() {
    let player = ScriptedPlayer::new();
    let release = player.gate("t1");
    let controller = spawn(player.clone()).await;

    controller.load_and_play(track("t1"), None).unwrap();
    wait_for_call(&player, "configure:t1", 1).await;
    controller.stop().unwrap();

    let state = wait_until(&controller, |s| s.current.is_none()).await;
    assert_eq!(state.status, PlaybackStatus::Idle);

    release.send(Ok(())).unwrap();
    wait_for_call(&player, "stop", 1).await;
    settle().await;

    assert_eq!(
        player.calls(),
        vec!["setup", "configure:t1", "configured:t1", "stop"]
    );
    assert_eq!(player.count("play"), 0);

    let state = controller.snapshot();
    assert_eq!(state.status, PlaybackStatus::Idle);
    assert!(state.current.is_none());
    assert!(state.queue.is_empty());
    assert!(!state.is_playing);
    assert_eq!(state.position_ms, 0);
}

#[tokio::test]
async fn test_pause_during_load_is_applied_once_ready() {
    let player = ScriptedPlayer::new();
    let release = player.gate("t1");
    let controller = spawn(player.clone()).await;

    controller.load_and_play(track("t1"), None).unwrap();
    wait_until(&controller, |s| s.status == PlaybackStatus::Loading).await;
    controller.toggle().unwrap();
    let state = wait_until(&controller, |s| !s.is_playing).await;
    assert_eq!(state.status, PlaybackStatus::Loading);

    release.send(Ok(())).unwrap();
    wait_ready(&controller, "t1").await;
    wait_for_call(&player, "pause", 1).await;
    settle().await;

    assert!(!controller.snapshot().is_playing);
    assert!(player.calls_after("play").contains(&"pause".to_string()));
}

#[tokio::test]
async fn test_repeat_queue_wraps_after_last_track() {
    let player = ScriptedPlayer::new();
    let controller = spawn(player.clone()).await;
    controller.set_repeat_mode(RepeatMode::Queue).unwrap();
    controller
        .load_and_play(track("t2"), Some(vec![track("t1"), track("t2")]))
        .unwrap();
    wait_ready(&controller, "t2").await;

    controller.next().unwrap();
    wait_ready(&controller, "t1").await;
    assert_eq!(controller.snapshot().repeat, RepeatMode::Queue);
}

#[tokio::test]
async fn test_background_pauses_polling() {
    let player = ScriptedPlayer::new();
    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let observer = Arc::new(ChannelLifecycle {
        initial: LifecycleState::Background,
        changes: Mutex::new(Some(changes_rx)),
    });
    let config = CoreConfig::builder()
        .native_player(player.clone())
        .lifecycle_observer(observer)
        .playback(settings())
        .build()
        .unwrap();
    let controller = PlaybackController::spawn(config).await.unwrap();

    controller.load_and_play(track("t1"), None).unwrap();
    wait_ready(&controller, "t1").await;
    settle().await;
    assert_eq!(player.position_queries.load(Ordering::SeqCst), 0);

    changes_tx.send(LifecycleState::Foreground).unwrap();
    timeout(WAIT, async {
        while player.position_queries.load(Ordering::SeqCst) == 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("polling resumed in foreground");

    controller
        .set_lifecycle_state(LifecycleState::Suspended)
        .unwrap();
    settle().await;
    let queries = player.position_queries.load(Ordering::SeqCst);
    settle().await;
    assert_eq!(player.position_queries.load(Ordering::SeqCst), queries);
}

#[tokio::test]
async fn test_commands_after_shutdown_fail() {
    let player = ScriptedPlayer::new();
    let controller = spawn(player.clone()).await;

    controller.shutdown().await.unwrap();
    controller.shutdown().await.unwrap();

    assert!(controller.is_closed());
    assert_eq!(
        controller.load_and_play(track("t1"), None),
        Err(PlaybackError::ControllerClosed)
    );
    assert_eq!(controller.toggle(), Err(PlaybackError::ControllerClosed));
}

#[tokio::test]
async fn test_spawn_reports_native_setup_failure() {
    let player = ScriptedPlayer::new();
    player.fail_setup.store(true, Ordering::SeqCst);
    let config = CoreConfig::builder()
        .native_player(player)
        .build()
        .unwrap();

    let err = PlaybackController::spawn(config).await.unwrap_err();
    assert!(matches!(
        err,
        PlaybackError::NativeBackend(BridgeError::DeviceBusy(_))
    ));
}

#[tokio::test]
async fn test_spawn_rejects_invalid_settings() {
    let player = ScriptedPlayer::new();
    let mut config = CoreConfig::builder()
        .native_player(player.clone())
        .build()
        .unwrap();
    config.playback.poll_interval_ms = 0;

    let err = PlaybackController::spawn(config).await.unwrap_err();
    assert!(matches!(err, PlaybackError::Config(_)));
    assert!(player.calls().is_empty());
}
