//! Transfer timing.
//!
//! Timestamps are a seconds + milliseconds pair, so elapsed time has a
//! whole-millisecond floor: transfers shorter than a millisecond report 0.

use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A point in time as whole seconds plus milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TeeTime {
    pub seconds: u32,
    /// Always below 1000.
    pub millis: u32,
}

impl TeeTime {
    pub fn new(seconds: u32, millis: u32) -> Self {
        Self {
            seconds: seconds.saturating_add(millis / 1000),
            millis: millis % 1000,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self {
            seconds: (ms / 1000) as u32,
            millis: (ms % 1000) as u32,
        }
    }

    pub fn as_millis(self) -> u64 {
        u64::from(self.seconds) * 1000 + u64::from(self.millis)
    }
}

impl fmt::Display for TeeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.seconds, self.millis)
    }
}

/// Whole milliseconds elapsed during a transfer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ElapsedMs(pub u64);

impl ElapsedMs {
    /// Elapsed time between two timestamps. A stop before the start is 0.
    pub fn between(start: TeeTime, stop: TeeTime) -> Self {
        Self(stop.as_millis().saturating_sub(start.as_millis()))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElapsedMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of transfer timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> TeeTime;
}

/// Monotonic clock measured from its own creation.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> TeeTime {
        let elapsed = self.origin.elapsed();
        TeeTime {
            seconds: elapsed.as_secs() as u32,
            millis: elapsed.subsec_millis(),
        }
    }
}

/// Deterministic clock for tests: every reading advances by a fixed step.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: Mutex<u64>,
    step_ms: u64,
}

impl ManualClock {
    /// A clock frozen at `start_ms`.
    pub fn fixed(start_ms: u64) -> Self {
        Self::stepping(start_ms, 0)
    }

    /// A clock starting at `start_ms` that moves `step_ms` after each reading.
    pub fn stepping(start_ms: u64, step_ms: u64) -> Self {
        Self {
            now_ms: Mutex::new(start_ms),
            step_ms,
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, ms: u64) {
        *self.now_ms.lock().expect("lock poisoned") += ms;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TeeTime {
        let mut now = self.now_ms.lock().expect("lock poisoned");
        let reading = TeeTime::from_millis(*now);
        *now += self.step_ms;
        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_millis() {
        assert_eq!(TeeTime::new(1, 1500), TeeTime::new(2, 500));
        assert_eq!(TeeTime::new(2, 500).as_millis(), 2500);
    }

    #[test]
    fn new_saturates_at_max_seconds() {
        let t = TeeTime::new(u32::MAX, 1000);
        assert_eq!(t.seconds, u32::MAX);
        assert_eq!(t.millis, 0);
        assert_eq!(TeeTime::new(u32::MAX - 1, 2500).seconds, u32::MAX);
    }

    #[test]
    fn elapsed_borrows_across_seconds() {
        let start = TeeTime::new(10, 900);
        let stop = TeeTime::new(11, 100);
        assert_eq!(ElapsedMs::between(start, stop), ElapsedMs(200));
    }

    #[test]
    fn elapsed_never_negative() {
        let start = TeeTime::new(5, 0);
        let stop = TeeTime::new(4, 999);
        assert_eq!(ElapsedMs::between(start, stop), ElapsedMs(0));
    }

    #[test]
    fn manual_clock_steps() {
        let clock = ManualClock::stepping(1_000, 7);
        assert_eq!(clock.now(), TeeTime::new(1, 0));
        assert_eq!(clock.now(), TeeTime::new(1, 7));
        clock.advance(993);
        assert_eq!(clock.now(), TeeTime::new(2, 7));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn display_formats() {
        assert_eq!(TeeTime::new(3, 7).to_string(), "3.007s");
        assert_eq!(ElapsedMs(42).to_string(), "42ms");
    }
}
