// SPDX-License-Identifier: MPL-2.0
//! Monotonic time and unit conversion helpers for the playback core.
//!
//! All clocks, frame timers and audio callback times are expressed in seconds
//! relative to a process-wide reference instant, so they can be stored as
//! plain `f64`s and compared across threads.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Microseconds per second as f64 for calculations.
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Reference instant all relative times are measured from.
static REFERENCE_INSTANT: OnceLock<Instant> = OnceLock::new();

/// Returns monotonic seconds since the reference instant.
#[must_use]
pub fn now_secs() -> f64 {
    let reference = REFERENCE_INSTANT.get_or_init(Instant::now);
    reference.elapsed().as_secs_f64()
}

/// Converts seconds to whole microseconds (seek targets, input timestamps).
#[allow(clippy::cast_possible_truncation)]
#[inline]
#[must_use]
pub fn secs_to_micros(secs: f64) -> i64 {
    (secs * MICROS_PER_SECOND) as i64
}

/// Converts microseconds to seconds.
#[allow(clippy::cast_precision_loss)]
#[inline]
#[must_use]
pub fn micros_to_secs(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}

/// Converts a non-negative number of seconds to a `Duration`, clamping
/// negatives and NaN to zero.
#[must_use]
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_secs_is_monotonic() {
        let a = now_secs();
        std::thread::sleep(Duration::from_millis(2));
        let b = now_secs();
        assert!(b > a);
    }

    #[test]
    fn micros_conversion() {
        assert_eq!(secs_to_micros(1.5), 1_500_000);
        assert_eq!(secs_to_micros(0.0), 0);
        assert!((micros_to_secs(250_000) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn secs_to_duration_clamps_invalid_values() {
        assert_eq!(secs_to_duration(-1.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(0.5), Duration::from_millis(500));
    }
}
