//! Target clocks
//!
//! The cycle loop parks on [`Timebase::sleep_until`] before every delivery,
//! so the clock alone decides pacing: wall-clock for live playout, free-run
//! for offline export, manual for tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A monotonic clock in seconds plus a way to park until a deadline
///
/// `sleep_until` with a deadline at or before `now()` returns immediately.
pub trait Timebase: Send + Sync {
    fn now(&self) -> f64;

    fn sleep_until(&self, deadline: f64);
}

/// Wall-clock time since construction
pub struct MonotonicTimebase {
    origin: Instant,
}

impl MonotonicTimebase {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicTimebase {
    fn default() -> Self {
        Self::new()
    }
}

impl Timebase for MonotonicTimebase {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn sleep_until(&self, deadline: f64) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(Duration::from_secs_f64(deadline - now));
        }
    }
}

/// A clock that jumps to every deadline instead of waiting
///
/// Drives a target as fast as the source can feed it; useful for export
/// sinks where real-time pacing is pointless.
pub struct FreeRunTimebase {
    // f64 seconds as bits, monotonically ratcheted
    virtual_now: AtomicU64,
}

impl FreeRunTimebase {
    pub fn new() -> Self {
        Self { virtual_now: AtomicU64::new(0f64.to_bits()) }
    }
}

impl Default for FreeRunTimebase {
    fn default() -> Self {
        Self::new()
    }
}

impl Timebase for FreeRunTimebase {
    fn now(&self) -> f64 {
        f64::from_bits(self.virtual_now.load(Ordering::Acquire))
    }

    fn sleep_until(&self, deadline: f64) {
        let _ = self
            .virtual_now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let current = f64::from_bits(bits);
                (deadline > current).then(|| deadline.to_bits())
            });
    }
}

/// A clock advanced explicitly by the test driving it
pub struct ManualTimebase {
    now: Mutex<f64>,
    advanced: Condvar,
}

impl ManualTimebase {
    pub fn new() -> Self {
        Self { now: Mutex::new(0.0), advanced: Condvar::new() }
    }

    /// Move time forward, releasing any thread parked before `to`
    pub fn advance_to(&self, to: f64) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        if to > *now {
            *now = to;
        }
        self.advanced.notify_all();
    }
}

impl Default for ManualTimebase {
    fn default() -> Self {
        Self::new()
    }
}

impl Timebase for ManualTimebase {
    fn now(&self) -> f64 {
        *self.now.lock().expect("clock lock poisoned")
    }

    fn sleep_until(&self, deadline: f64) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        while *now < deadline {
            now = self.advanced.wait(now).expect("clock lock poisoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn monotonic_returns_immediately_for_past_deadlines() {
        let clock = MonotonicTimebase::new();
        let start = Instant::now();
        clock.sleep_until(0.0);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn free_run_jumps_without_waiting() {
        let clock = FreeRunTimebase::new();
        let start = Instant::now();
        clock.sleep_until(3600.0);
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(clock.now(), 3600.0);

        // Time never moves backwards
        clock.sleep_until(10.0);
        assert_eq!(clock.now(), 3600.0);
    }

    #[test]
    fn manual_clock_blocks_until_advanced() {
        let clock = Arc::new(ManualTimebase::new());
        let waiter = Arc::clone(&clock);
        let handle = std::thread::spawn(move || {
            waiter.sleep_until(1.0);
            waiter.now()
        });

        std::thread::sleep(Duration::from_millis(10));
        clock.advance_to(1.5);
        assert_eq!(handle.join().unwrap(), 1.5);
    }
}
