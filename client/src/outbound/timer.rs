//! Tokio-backed countdown timer.

use std::time::Duration;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::domain::ports::{CountdownTimer, TimerHandle, TimerTick};

/// Shortest period accepted; Tokio intervals reject a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Countdown timer that spawns one interval task per countdown.
#[derive(Debug, Clone)]
pub struct TokioCountdownTimer {
    runtime: Handle,
}

impl TokioCountdownTimer {
    /// Spawn ticks onto `runtime`.
    pub const fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Spawn ticks onto the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a Tokio runtime.
    pub fn from_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl CountdownTimer for TokioCountdownTimer {
    fn start(&self, period: Duration, mut tick: TimerTick) -> TimerHandle {
        let every = period.max(MIN_PERIOD);
        let task = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + every, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick();
            }
        });
        debug!(period_ms = every.as_millis(), "countdown timer started");
        TimerHandle::new(move || task.abort())
    }
}

#[cfg(test)]
mod tests {
    //! Timing coverage on a paused Tokio clock.

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_tick() -> (Arc<AtomicUsize>, TimerTick) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let tick: TimerTick = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (ticks, tick)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_after_the_first_period() {
        let timer = TokioCountdownTimer::from_current().expect("inside runtime");
        let (ticks, tick) = counting_tick();

        let _handle = timer.start(Duration::from_secs(1), tick);
        assert_eq!(ticks.load(Ordering::SeqCst), 0, "no tick from start itself");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2_600)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_further_ticks() {
        let timer = TokioCountdownTimer::from_current().expect("inside runtime");
        let (ticks, tick) = counting_tick();

        let mut handle = timer.start(Duration::from_secs(1), tick);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels() {
        let timer = TokioCountdownTimer::from_current().expect("inside runtime");
        let (ticks, tick) = counting_tick();

        drop(timer.start(Duration::from_secs(1), tick));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn from_current_fails_outside_a_runtime() {
        assert!(TokioCountdownTimer::from_current().is_err());
    }
}
