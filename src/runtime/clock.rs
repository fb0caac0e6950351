//! clock.rs
//! Monotonic time source for the tick loop plus the drift-correction rule.
//!
//! - `SpinClock`: `Instant` + SpinSleeper (OS sleep, then spin the last 100 µs) for low wake jitter
//! - `ManualClock`: shared virtual instant for headless replay, tests and benches
//! - `next_due_after_tick`: pure catch-up policy, never schedules more than one tick per wake

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use spin_sleep::{SpinSleeper, SpinStrategy};

pub trait Clock {
    fn now(&self) -> Instant;

    /// Blocks until `deadline`. Returns immediately if it already passed.
    fn sleep_until(&self, deadline: Instant);
}

pub struct SpinClock {
    sleeper: SpinSleeper,
}

impl SpinClock {
    pub fn new() -> Self {
        Self {
            sleeper: SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread),
        }
    }
}

impl Default for SpinClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SpinClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if now < deadline {
            self.sleeper.sleep(deadline - now);
        }
    }
}

/// Virtual clock: `sleep_until` jumps straight to the deadline. Clones share one timeline, so
/// a test can inject a stall from inside a tick with `advance`.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
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
        *self.now.lock()
    }

    fn sleep_until(&self, deadline: Instant) {
        let mut now = self.now.lock();
        if *now < deadline {
            *now = deadline;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    OnTime,
    /// Tick overran; schedule restarted from `now`. `behind` is how late the naive slot was.
    Resynced { behind: Duration },
}

/// Next release after a tick finishing at `now`: `next_due + period`, unless that slot is
/// already in the past, in which case `now + period`. The result always lies in
/// `[now, now + period]` when `next_due <= now`.
pub fn next_due_after_tick(now: Instant, next_due: Instant, period: Duration) -> (Instant, Pacing) {
    let candidate = next_due + period;
    if now > candidate {
        (now + period, Pacing::Resynced { behind: now - candidate })
    } else {
        (candidate, Pacing::OnTime)
    }
}
