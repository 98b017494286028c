//! Monotonic time sources.
//!
//! The clock is only consulted to turn a stream's start time into a frame
//! offset. Mix pacing comes from buffer availability, never from a timer.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A monotonic wall clock.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// [`Instant::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// ```
/// # use mixdown::{Clock, ManualClock};
/// # use std::time::Duration;
/// let clock = ManualClock::new();
/// let t0 = clock.now();
/// clock.advance(Duration::from_millis(5));
/// assert_eq!(clock.now() - t0, Duration::from_millis(5));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Whole frames from `now` until `start`, rounded to the nearest frame.
///
/// Negative when `start` has already passed.
pub(crate) fn frames_until(start: Instant, now: Instant, sample_rate: u32) -> i64 {
    let secs = if start >= now {
        (start - now).as_secs_f64()
    } else {
        -(now - start).as_secs_f64()
    };
    (secs * sample_rate as f64).round() as i64
}

impl<C: Clock> Clock for std::sync::Arc<C> {
    #[inline]
    fn now(&self) -> Instant {
        (**self).now()
    }
}
