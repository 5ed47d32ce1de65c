//! Per-symbol, per-feed exponential backoff.
//!
//! The controller only answers "may I retry now?"; the polling scheduler
//! owns all actual timing. Attempt timestamps are wrapping ticks, so the
//! retry gate stays correct across timer wraparound.

use crate::core::clock::{age_ms, TickMs};

/// Fixed backoff policy constants.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub min_delay_ms: u32,
    pub max_delay_ms: u32,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_delay_ms: 1000,
            max_delay_ms: 60_000,
            multiplier: 1.5,
        }
    }
}

/// Retry gate for one (symbol, feed) pair. Lives for the process lifetime.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current_delay_ms: u32,
    last_attempt_ms: TickMs,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current_delay_ms: policy.min_delay_ms,
            last_attempt_ms: 0,
        }
    }

    /// True once the current delay has elapsed since the last attempt.
    pub fn should_retry(&self, now: TickMs) -> bool {
        age_ms(now, self.last_attempt_ms) >= self.current_delay_ms
    }

    /// Record an attempt outcome: success resets the delay to the minimum,
    /// failure multiplies it up to the configured ceiling.
    pub fn record_outcome(&mut self, now: TickMs, success: bool) {
        self.last_attempt_ms = now;
        if success {
            self.current_delay_ms = self.policy.min_delay_ms;
        } else {
            let grown = (self.current_delay_ms as f64 * self.policy.multiplier) as u32;
            self.current_delay_ms = grown.min(self.policy.max_delay_ms);
        }
    }

    pub fn current_delay_ms(&self) -> u32 {
        self.current_delay_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> BackoffPolicy {
        BackoffPolicy {
            min_delay_ms: 1000,
            max_delay_ms: 60_000,
            multiplier: 1.5,
        }
    }

    #[test]
    fn test_delay_grows_exponentially_on_failures() {
        let mut backoff = Backoff::new(test_policy());
        assert_eq!(backoff.current_delay_ms(), 1000);

        let expected = [1500, 2250, 3375, 5062, 7593];
        for (n, want) in expected.iter().enumerate() {
            backoff.record_outcome(n as TickMs * 10_000, false);
            assert_eq!(backoff.current_delay_ms(), *want, "after failure {}", n + 1);
        }
    }

    #[test]
    fn test_delay_clamped_at_max() {
        let mut backoff = Backoff::new(test_policy());
        for _ in 0..30 {
            backoff.record_outcome(0, false);
        }
        assert_eq!(backoff.current_delay_ms(), 60_000);
    }

    #[test]
    fn test_single_success_resets_delay() {
        let mut backoff = Backoff::new(test_policy());
        for _ in 0..7 {
            backoff.record_outcome(0, false);
        }
        assert!(backoff.current_delay_ms() > 1000);

        backoff.record_outcome(0, true);
        assert_eq!(backoff.current_delay_ms(), 1000);
    }

    #[test]
    fn test_retry_gate_boundaries() {
        let mut backoff = Backoff::new(test_policy());
        backoff.record_outcome(10_000, false); // delay now 1500

        assert!(!backoff.should_retry(10_000));
        assert!(!backoff.should_retry(10_001));
        assert!(!backoff.should_retry(11_499));
        assert!(backoff.should_retry(11_500));
        assert!(backoff.should_retry(20_000));
    }

    #[test]
    fn test_retry_gate_across_wraparound() {
        let mut backoff = Backoff::new(test_policy());
        let just_before_wrap = TickMs::MAX - 200;
        backoff.record_outcome(just_before_wrap, true); // delay back to 1000

        // 300 ticks later the counter has wrapped to 99
        assert!(!backoff.should_retry(99));
        // exactly 1000 ticks after the attempt
        assert!(backoff.should_retry(just_before_wrap.wrapping_add(1000)));
        assert!(backoff.should_retry(1500));
    }

    #[test]
    fn test_fresh_controller_waits_min_delay_from_zero() {
        let backoff = Backoff::new(test_policy());
        assert!(!backoff.should_retry(999));
        assert!(backoff.should_retry(1000));
    }
}
