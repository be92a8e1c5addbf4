//! # Concentrator Time
//!
//! The JIT queue works on the concentrator's free-running microsecond
//! counter. The counter is 32 bits wide and rolls over roughly every 71.6
//! minutes, so every comparison between two instants is done as a wrapping
//! subtraction: `target - now` is the forward distance from `now` to
//! `target`, and anything "in the past" shows up as a huge forward distance.
//!
//! ```text
//!   0                      now        target              u32::MAX
//!   |-----------------------|==========>|-----------------------|
//!                            offset(target, now)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use r4w_jit::timing::{offset, Clock, MockClock};
//!
//! let clock = MockClock::at(u32::MAX - 10);
//! let target = clock.now_us().wrapping_add(100);
//! assert_eq!(offset(target, clock.now_us()), 100);
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// A concentrator timestamp in microseconds (wraps at 2^32).
pub type CountUs = u32;

/// Forward distance from `now` to `target` on the wrapping counter.
#[inline]
pub const fn offset(target: CountUs, now: CountUs) -> u32 {
    target.wrapping_sub(now)
}

/// Convert a duration to counter ticks, wrapping like the hardware counter.
#[inline]
pub fn duration_to_count(duration: Duration) -> CountUs {
    (duration.as_secs() as u32)
        .wrapping_mul(1_000_000)
        .wrapping_add(duration.subsec_micros())
}

/// Source of concentrator time.
pub trait Clock: Send + Sync {
    /// Current counter value in microseconds.
    fn now_us(&self) -> CountUs;
}

/// Monotonic clock backed by `std::time::Instant`, truncated to 32 bits.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_us(&self) -> CountUs {
        duration_to_count(self.epoch.elapsed())
    }
}

/// Mock clock for testing - allows manual time advancement
#[derive(Debug, Default)]
pub struct MockClock {
    current_us: AtomicU32,
}

impl MockClock {
    pub fn new() -> Self {
        Self::at(0)
    }

    /// Start the clock at a specific counter value.
    pub fn at(count_us: CountUs) -> Self {
        Self {
            current_us: AtomicU32::new(count_us),
        }
    }

    /// Advance time, wrapping at the counter width.
    pub fn advance_us(&self, us: u32) {
        // fetch_add on atomics wraps on overflow
        self.current_us.fetch_add(us, Ordering::SeqCst);
    }

    pub fn advance(&self, duration: Duration) {
        self.advance_us(duration_to_count(duration));
    }

    pub fn set_us(&self, count_us: CountUs) {
        self.current_us.store(count_us, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> CountUs {
        self.current_us.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_us(&self) -> CountUs {
        (**self).now_us()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_wraps() {
        assert_eq!(offset(10, 5), 5);
        assert_eq!(offset(5, u32::MAX - 4), 10);
        // a target behind "now" looks very far ahead
        assert_eq!(offset(5, 10), u32::MAX - 4);
    }

    #[test]
    fn test_duration_to_count() {
        assert_eq!(duration_to_count(Duration::from_millis(1500)), 1_500_000);
        // 4295 s overflows a 32-bit microsecond counter
        assert_eq!(duration_to_count(Duration::from_secs(4295)), 32_704);
    }

    #[test]
    fn test_mock_clock() {
        let clock = MockClock::new();
        assert_eq!(clock.now_us(), 0);

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now_us(), 250_000);

        clock.set_us(u32::MAX);
        clock.advance_us(2);
        assert_eq!(clock.now_us(), 1);
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_us();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.now_us();
        assert!(offset(b, a) >= 2_000);
    }
}
