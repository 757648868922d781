//! Monotonic time source, injectable so limiter tests can advance time
//! deterministically instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Seconds since some fixed epoch, as a floating point value.
///
/// Local limiters only ever compare two `Seconds` values or add a duration
/// to one — they never need wall-clock/UTC semantics, so this is backed by
/// a monotonic `Instant` rather than `SystemTime`.
pub type Seconds = f64;

/// A source of monotonic time. Implementations must never go backwards.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Seconds;
}

/// Production clock — wraps a process-wide monotonic `Instant` so `now()`
/// is cheap (no syscall-heavy `SystemTime::now()` on the hot path) and
/// immune to wall-clock adjustments.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Seconds {
        self.start.elapsed().as_secs_f64()
    }
}

/// Deterministic clock for tests. Starts at `0.0`; advance with `advance()`
/// or pin to an exact value with `set()`.
#[derive(Debug, Clone)]
pub struct MockClock {
    micros: Arc<AtomicU64>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            micros: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set(&self, seconds: Seconds) {
        self.micros
            .store((seconds * 1_000_000.0) as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: Seconds) {
        let delta = (seconds * 1_000_000.0) as u64;
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Seconds {
        self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }
}
