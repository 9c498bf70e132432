//! Monotonic time source.
//!
//! All timestamps and durations in a trace come from `CLOCK_MONOTONIC`
//! so they never go backward; wall-clock adjustments in the host
//! process cannot reorder events.

use nix::time::{clock_gettime, ClockId};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Nanoseconds since the monotonic clock's (arbitrary) epoch.
pub fn now_ns() -> u64 {
    match clock_gettime(ClockId::CLOCK_MONOTONIC) {
        Ok(ts) => ts.tv_sec() as u64 * NANOS_PER_SEC + ts.tv_nsec() as u64,
        // CLOCK_MONOTONIC is always supported on the platforms the
        // tracer runs on; a zero timestamp is still decodable.
        Err(_) => 0,
    }
}
