//! Wrapping millisecond tick clock.
//!
//! All timestamps in the state model are `u32` millisecond ticks measured
//! from process start. The counter wraps after ~49.7 days, so ages must be
//! computed with `wrapping_sub`, never signed comparison. A tick of `0`
//! conventionally means "never".

use std::sync::OnceLock;
use std::time::Instant;

/// Millisecond tick, wrapping at `u32::MAX`.
pub type TickMs = u32;

/// Ages at or above this are assumed to come from a wrapped subtraction of
/// an in-flight timestamp and are not treated as real elapsed time.
pub const IMPLAUSIBLE_AGE_MS: TickMs = 4_000_000_000;

static START: OnceLock<Instant> = OnceLock::new();

/// Milliseconds since process start, truncated to the wrapping tick width.
pub fn now_ms() -> TickMs {
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_millis() as TickMs
}

/// Elapsed ticks between `then` and `now`, correct across wraparound.
pub fn age_ms(now: TickMs, then: TickMs) -> TickMs {
    now.wrapping_sub(then)
}
