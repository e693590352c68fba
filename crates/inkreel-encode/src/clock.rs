//! Time source for the bounded poll loops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub trait Clock: Send + Sync {
    /// Give other threads a chance to make progress.
    fn yield_now(&self);

    fn sleep(&self, duration: Duration);
}

/// Real threads, real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn yield_now(&self) {
        std::thread::yield_now();
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records calls without waiting. For tests of the poll loops.
#[derive(Debug, Default)]
pub struct ManualClock {
    yields: AtomicU64,
    slept_us: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn yields(&self) -> u64 {
        self.yields.load(Ordering::Relaxed)
    }

    pub fn slept(&self) -> Duration {
        Duration::from_micros(self.slept_us.load(Ordering::Relaxed))
    }
}

impl Clock for ManualClock {
    fn yield_now(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
    }

    fn sleep(&self, duration: Duration) {
        self.slept_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }
}
