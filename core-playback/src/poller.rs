//! Position polling.
//!
//! While a track is ready the controller samples the native position at a
//! fixed interval. Each poller is bound to one load generation; the timer
//! handle lives next to the state and is cancelled whenever the state
//! machine asks for it.

use crate::adapter::NativeBackendAdapter;
use crate::machine::PositionSample;
use core_async::time::Duration;
use core_async::RepeatingTimer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

pub struct PositionPoller {
    timer: RepeatingTimer,
    generation: u64,
}

impl PositionPoller {
    /// Start sampling `adapter` every `period`.
    ///
    /// `on_sample` receives each successful sample and returns `false` once
    /// nobody is listening, which ends the poller. A tick is skipped while the
    /// previous native query is still outstanding.
    pub fn start<F>(
        adapter: NativeBackendAdapter,
        generation: u64,
        period: Duration,
        on_sample: F,
    ) -> Self
    where
        F: Fn(u64, PositionSample) -> bool + Send + Sync + 'static,
    {
        let on_sample = Arc::new(on_sample);
        let in_flight = Arc::new(AtomicBool::new(false));
        let listening = Arc::new(AtomicBool::new(true));

        let period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        debug!(generation, period_ms, "Position polling started");

        let timer = RepeatingTimer::start(period, move || {
            if !listening.load(Ordering::SeqCst) {
                return false;
            }
            if in_flight.swap(true, Ordering::SeqCst) {
                trace!(generation, "Previous position query still running");
                return true;
            }

            let adapter = adapter.clone();
            let on_sample = Arc::clone(&on_sample);
            let in_flight = Arc::clone(&in_flight);
            let listening = Arc::clone(&listening);
            core_async::spawn(async move {
                match adapter.sample().await {
                    Ok(sample) => {
                        if !on_sample(generation, sample) {
                            listening.store(false, Ordering::SeqCst);
                        }
                    }
                    Err(err) => debug!(generation, error = %err, "Position query failed"),
                }
                in_flight.store(false, Ordering::SeqCst);
            });
            true
        });

        Self { timer, generation }
    }

    pub fn stop(&self) {
        debug!(generation = self.generation, "Position polling stopped");
        self.timer.cancel();
    }
}

impl std::fmt::Debug for PositionPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionPoller")
            .field("generation", &self.generation)
            .field("period", &self.timer.period())
            .finish()
    }
}
