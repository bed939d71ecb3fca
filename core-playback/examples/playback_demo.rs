//! # Playback Controller Demo
//!
//! Drives the playback controller against an in-process simulated native
//! player: load a short queue, pause and resume, seek near the end and let
//! the controller auto-advance.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use anyhow::Result;
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{MediaItem, NativeEvent, NativeEventSink, NativePlayer, RepeatMode};
use core_playback::{PlaybackController, PlaybackStatus, Track};
use core_runtime::config::{CoreConfig, PlaybackSettings};
use core_runtime::events::{CoreEvent, PlaybackEvent};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// Simulated native player
// ============================================================================

/// Plays nothing, but keeps a clock that advances while "playing".
#[derive(Default)]
struct SimulatedPlayer {
    inner: Mutex<Simulation>,
}

#[derive(Default)]
struct Simulation {
    queue: Vec<MediaItem>,
    index: usize,
    offset: Duration,
    started_at: Option<Instant>,
    sink: Option<NativeEventSink>,
}

impl Simulation {
    fn position(&self) -> Duration {
        self.offset + self.started_at.map_or(Duration::ZERO, |at| at.elapsed())
    }

    fn restart(&mut self) {
        self.offset = Duration::ZERO;
        self.started_at = None;
    }

    fn notify(&self, playing: bool) {
        if let Some(sink) = &self.sink {
            sink.emit(NativeEvent::PlaybackStateChange { playing });
        }
    }
}

#[async_trait]
impl NativePlayer for SimulatedPlayer {
    fn attach_events(&self, sink: NativeEventSink) {
        self.inner.lock().expect("simulation lock").sink = Some(sink);
    }

    async fn configure(&self, item: MediaItem, queue: Vec<MediaItem>) -> BridgeResult<()> {
        let mut sim = self.inner.lock().expect("simulation lock");
        sim.index = queue.iter().position(|i| i.id == item.id).unwrap_or(0);
        sim.queue = queue;
        sim.restart();
        println!("  [native] now playing on lock screen: {}", item.title);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        let mut sim = self.inner.lock().expect("simulation lock");
        if sim.started_at.is_none() {
            sim.started_at = Some(Instant::now());
            sim.notify(true);
        }
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        let mut sim = self.inner.lock().expect("simulation lock");
        sim.offset = sim.position();
        sim.started_at = None;
        sim.notify(false);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        let mut sim = self.inner.lock().expect("simulation lock");
        sim.offset = position;
        if sim.started_at.is_some() {
            sim.started_at = Some(Instant::now());
        }
        Ok(())
    }

    async fn skip_next(&self) -> BridgeResult<()> {
        let mut sim = self.inner.lock().expect("simulation lock");
        sim.index = (sim.index + 1).min(sim.queue.len().saturating_sub(1));
        sim.restart();
        Ok(())
    }

    async fn skip_previous(&self) -> BridgeResult<()> {
        let mut sim = self.inner.lock().expect("simulation lock");
        sim.index = sim.index.saturating_sub(1);
        sim.restart();
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        let mut sim = self.inner.lock().expect("simulation lock");
        sim.queue.clear();
        sim.restart();
        Ok(())
    }

    async fn set_repeat_mode(&self, _mode: RepeatMode) -> BridgeResult<()> {
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(self.inner.lock().expect("simulation lock").position())
    }

    async fn duration(&self) -> BridgeResult<Option<Duration>> {
        let sim = self.inner.lock().expect("simulation lock");
        Ok(sim.queue.get(sim.index).and_then(|item| item.duration))
    }
}

// ============================================================================
// Demo
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;

    let config = CoreConfig::builder()
        .native_player(Arc::new(SimulatedPlayer::default()))
        .playback(PlaybackSettings::default().with_poll_interval_ms(100))
        .build()?;
    let controller = PlaybackController::spawn(config).await?;

    let mut events = controller.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if !matches!(event, CoreEvent::Playback(PlaybackEvent::PositionChanged { .. })) {
                println!("  [event] {}: {:?}", event.description(), event);
            }
        }
    });

    let queue = vec![
        Track::new("breath", "Box Breathing", "https://cdn.example.com/breath.m4a")
            .with_artist("Healing Player")
            .with_duration_ms(3_000),
        Track::new("sleep", "Sleep Story", "https://cdn.example.com/sleep.m4a")
            .with_artist("Healing Player")
            .with_duration_ms(2_000),
    ];

    println!("Loading first track");
    controller.load_and_play(queue[0].clone(), Some(queue.clone()))?;
    let mut state = controller.subscribe();
    state
        .wait_for(|s| s.status == PlaybackStatus::Ready)
        .await?;

    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("Pause / resume");
    controller.toggle()?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    controller.toggle()?;

    println!("Seek close to the end; the controller advances on its own");
    controller.seek(2_800)?;
    state
        .wait_for(|s| s.current_id() == Some("sleep") && s.status == PlaybackStatus::Ready)
        .await?;

    state
        .wait_for(|s| s.status == PlaybackStatus::Idle)
        .await?;
    let snapshot = controller.snapshot();
    println!(
        "Queue finished: current={:?} playing={} position={}ms",
        snapshot.current_id(),
        snapshot.is_playing,
        snapshot.position_ms
    );

    controller.stop()?;
    controller.shutdown().await?;
    Ok(())
}
