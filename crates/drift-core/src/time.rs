//! Millisecond time for real-time synchronization
//!
//! - `Millis` - Wall-clock or server-clock time in milliseconds
//! - `WallClock` - Source of "now" (system clock in production, manual in tests)
//! - `Cadence` - Fixed-period trigger polled from a loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Milliseconds, fractional
///
/// Fractional because the clock offset is an average and rarely lands on a
/// whole millisecond.
pub type Millis = f64;

/// A source of the current local time
pub trait WallClock {
    /// Milliseconds since the UNIX epoch, by this clock's reckoning
    fn now_millis(&self) -> Millis;
}

/// The operating-system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_millis(&self) -> Millis {
        chrono::Utc::now().timestamp_micros() as f64 / 1000.0
    }
}

/// A clock that only moves when told to
///
/// Clones share the same reading, so a test can hold one handle while the
/// code under test holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start`
    pub fn new(start: Millis) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    /// Jump to an absolute reading
    pub fn set(&self, now: Millis) {
        self.bits.store(now.to_bits(), Ordering::SeqCst);
    }

    /// Move forward by `delta` milliseconds
    pub fn advance(&self, delta: Millis) {
        self.set(self.now_millis() + delta);
    }
}

impl WallClock for ManualClock {
    fn now_millis(&self) -> Millis {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

impl<C: WallClock + ?Sized> WallClock for &C {
    fn now_millis(&self) -> Millis {
        (**self).now_millis()
    }
}

/// Fires at most once per `interval`, measured on whatever clock the caller
/// passes in
#[derive(Debug, Clone)]
pub struct Cadence {
    interval: Millis,
    last_fired: Option<Millis>,
}

impl Cadence {
    /// Create a cadence with the given period
    pub fn new(interval: Millis) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    /// Create a cadence whose first period starts at `now`
    pub fn starting_at(interval: Millis, now: Millis) -> Self {
        Self {
            interval,
            last_fired: Some(now),
        }
    }

    /// Returns true (and rearms) if a period has elapsed since the last firing
    ///
    /// The first poll always fires.
    pub fn poll(&mut self, now: Millis) -> bool {
        match self.last_fired {
            Some(last) if now - last < self.interval => false,
            _ => {
                self.last_fired = Some(now);
                true
            }
        }
    }

    /// Period in milliseconds
    pub fn interval(&self) -> Millis {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(1_000.0);
        let handle = clock.clone();

        handle.advance(16.5);
        assert_eq!(clock.now_millis(), 1_016.5);

        clock.set(0.0);
        assert_eq!(handle.now_millis(), 0.0);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000.0);
    }

    #[test]
    fn test_cadence() {
        let mut cadence = Cadence::new(100.0);
        assert!(cadence.poll(0.0));
        assert!(!cadence.poll(50.0));
        assert!(!cadence.poll(99.9));
        assert!(cadence.poll(100.0));
        assert!(!cadence.poll(150.0));
        assert!(cadence.poll(230.0));
    }

    #[test]
    fn test_cadence_starting_at() {
        let mut cadence = Cadence::starting_at(100.0, 1_000.0);
        assert!(!cadence.poll(1_000.0));
        assert!(!cadence.poll(1_099.0));
        assert!(cadence.poll(1_100.0));
        assert_eq!(cadence.interval(), 100.0);
    }
}
