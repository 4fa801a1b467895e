//! Monotonic clock capability.
//!
//! The streaming logger measures elapsed time and paces the poll interval
//! through a [`Clock`] it owns, so tests can substitute [`ManualClock`] and
//! run a multi-hour discharge instantly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic time and delays.
///
/// # Contract
/// - `now` never decreases between calls on the same clock
/// - `sleep` blocks (or simulates blocking) for at least `duration`
pub trait Clock: Send {
    /// Offset from an arbitrary fixed origin.
    fn now(&self) -> Duration;

    /// Wait for `duration` to pass.
    fn sleep(&self, duration: Duration);
}

/// Wall-independent clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Clock starting at zero now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle while the logger
/// owns another. `sleep` advances the shared time instead of blocking.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// Clock frozen at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward.
    pub fn advance(&self, duration: Duration) {
        let step = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(step, Ordering::SeqCst);
    }

    /// Current time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        clock.sleep(Duration::from_millis(250));
        handle.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_millis(1250));
        assert_eq!(handle.elapsed_ms(), 1250);
    }

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_millis(2));
        assert!(clock.now() >= before + Duration::from_millis(2));
    }
}
