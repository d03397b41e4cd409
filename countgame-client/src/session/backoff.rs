//! Reconnect backoff
//!
//! `delay(attempt) = min(base × 2^attempt, cap)`, with `attempt` starting at
//! 1 for the first retry. After `max_attempts` retries the connection is
//! declared dead.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(10_000), 5)
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap: cap.max(base),
            max_attempts,
        }
    }

    /// Delay before retry number `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |d| d.min(self.cap))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delays for every permitted retry, in order
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_attempts).map(move |attempt| self.delay(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = policy.schedule().map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn test_delays_monotonic_and_capped() {
        let policy = BackoffPolicy::new(Duration::from_millis(300), Duration::from_secs(5), 40);
        let delays: Vec<Duration> = policy.schedule().collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(5)));
        assert_eq!(*delays.last().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(200), Duration::from_millis(10_000));
    }

    #[test]
    fn test_cap_below_base_is_raised() {
        let policy = BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(1), 3);
        assert_eq!(policy.delay(1), Duration::from_secs(2));
    }
}
