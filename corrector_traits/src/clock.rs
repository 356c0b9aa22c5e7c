use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source shared by the dispatcher and the simulator.
///
/// - now(): monotonic Instant
/// - sleep(): pause (test clocks advance instead of sleeping)
/// - ms_since() / us_since(): elapsed helpers relative to an epoch
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let ms = self.now().saturating_duration_since(epoch).as_millis();
        ms.min(u128::from(u64::MAX)) as u64
    }

    /// Microseconds elapsed since `epoch`; used for inference latency.
    fn us_since(&self, epoch: Instant) -> u64 {
        let us = self.now().saturating_duration_since(epoch).as_micros();
        us.min(u128::from(u64::MAX)) as u64
    }
}

/// Wall-clock-free real-time clock backed by `Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

/// Manually advanced clock for deterministic pacing in tests and simulations.
///
/// now() = origin + offset; sleep(d) advances the offset without blocking.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: std::sync::Arc<std::sync::Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: std::sync::Arc::new(std::sync::Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        let epoch = clock.now();
        clock.sleep(Duration::from_millis(25));
        assert_eq!(clock.ms_since(epoch), 25);
        assert_eq!(clock.us_since(epoch), 25_000);
    }

    #[test]
    fn ms_since_saturates_for_future_epoch() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_millis(10));
        let later = clock.now();
        let fresh = ManualClock::new();
        assert_eq!(fresh.ms_since(later + Duration::from_secs(1)), 0);
    }
}
