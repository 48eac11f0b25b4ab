//! Driven port for periodic countdown ticks.
//!
//! The camera session never sleeps itself; it asks a timer for ticks so tests
//! can fire them by hand.

use std::time::Duration;

/// Callback invoked on every tick.
pub type TimerTick = Box<dyn FnMut() + Send + 'static>;

/// Handle to a running timer. Dropping it cancels the timer.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    /// Wrap the adapter's cancellation routine.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop further ticks. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Port for scheduling repeated ticks.
pub trait CountdownTimer: Send + Sync {
    /// Call `tick` once per `period` until the returned handle is cancelled.
    ///
    /// The first tick fires one period after `start`; implementations must
    /// never invoke `tick` from within `start` itself.
    fn start(&self, period: Duration, tick: TimerTick) -> TimerHandle;
}
