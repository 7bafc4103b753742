use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of reading timestamps, in milliseconds since the Unix epoch.
///
/// Every call returns a value strictly greater than the previous one, so
/// each tick's batch sorts after everything inserted before it.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock with a monotonic guard against backwards jumps and repeats.
///
/// # Examples
///
/// ```
/// use bms_sim::sim::clock::{Clock, SystemClock};
///
/// let clock = SystemClock::new();
/// let a = clock.now_ms();
/// let b = clock.now_ms();
/// assert!(b > a);
/// ```
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Deterministic clock advancing by a fixed step per call.
///
/// Useful for replays and tests where wall time is irrelevant.
#[derive(Debug)]
pub struct SteppedClock {
    next: AtomicU64,
    step: u64,
}

impl SteppedClock {
    /// Creates a clock whose first reading is `start`.
    ///
    /// # Arguments
    ///
    /// * `start` - First timestamp returned
    /// * `step` - Increment between readings (clamped to at least 1)
    pub fn new(start: u64, step: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
            step: step.max(1),
        }
    }
}

impl Clock for SteppedClock {
    fn now_ms(&self) -> u64 {
        self.next.fetch_add(self.step, Ordering::AcqRel)
    }
}
