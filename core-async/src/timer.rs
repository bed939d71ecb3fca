//! Cancellable repeating timers.
//!
//! A [`RepeatingTimer`] owns the spawned ticking task. Cancelling the timer,
//! or dropping the handle, stops the task; no tick is delivered after
//! [`RepeatingTimer::cancel`] returns.

use crate::sync::CancellationToken;
use crate::task::{self, JoinHandle};
use crate::time::{interval, Duration, MissedTickBehavior};

/// Handle to a task that invokes a callback at a fixed period.
///
/// The first tick fires immediately after [`RepeatingTimer::start`]. The
/// callback returns `false` to end the timer from the inside.
///
/// # Example
///
/// ```rust
/// use core_async::timer::RepeatingTimer;
/// use core_async::time::Duration;
///
/// # async fn example() {
/// let timer = RepeatingTimer::start(Duration::from_millis(250), || {
///     // poll something
///     true
/// });
/// timer.cancel();
/// assert!(!timer.is_active());
/// # }
/// ```
#[derive(Debug)]
pub struct RepeatingTimer {
    token: CancellationToken,
    handle: JoinHandle<()>,
    period: Duration,
}

impl RepeatingTimer {
    /// Spawn the ticking task on the current runtime.
    pub fn start<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = task::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if cancelled.is_cancelled() || !on_tick() {
                            break;
                        }
                    }
                }
            }
            let period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
            tracing::trace!(period_ms, "Repeating timer finished");
        });

        Self {
            token,
            handle,
            period,
        }
    }

    /// Stop the timer. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` while the timer has not been cancelled and its task is
    /// still running.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }

    /// The configured tick period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let timer = RepeatingTimer::start(Duration::from_millis(250), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        // immediate tick + two more
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        timer.cancel();
        assert!(!timer.is_active());
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_can_stop_the_timer() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let timer = RepeatingTimer::start(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst) < 1
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let timer = RepeatingTimer::start(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(timer);

        let seen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }
}
