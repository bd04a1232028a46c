use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Exponential backoff schedule for failed publish attempts.
///
/// Delay grows as `base * 2^attempt` up to `max_delay_secs`; jitter adds up to
/// `jitter * delay` on top to spread retries of jobs that failed together.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt ceiling; reaching it forces terminal failure regardless of
    /// how the error was classified.
    pub max_attempts: i32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    /// Jitter fraction (0.0-1.0) applied on top of the capped delay.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 30,
            max_delay_secs: 3600, // 1 hour
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Capped exponential delay for the given attempt number, without jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Shift saturates well past the cap; 63 would overflow u64.
        let factor = 1u64 << attempt.min(32);
        let secs = self
            .base_delay_secs
            .saturating_mul(factor)
            .min(self.max_delay_secs);
        Duration::from_secs(secs)
    }

    /// Earliest next run time after `attempts` claim attempts.
    pub fn next_run_at(&self, now: DateTime<Utc>, attempts: i32) -> DateTime<Utc> {
        let delay = self.delay_for_attempt(attempts.max(0) as u32);
        let jitter_cap = (delay.as_secs_f64() * self.jitter) as u64;
        let jitter_secs = if jitter_cap > 0 {
            rand::thread_rng().gen_range(0..=jitter_cap)
        } else {
            0
        };
        now + chrono::Duration::seconds((delay.as_secs() + jitter_secs) as i64)
    }

    pub fn is_exhausted(&self, attempts: i32) -> bool {
        attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_exponential_delays() {
        let policy = no_jitter();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(120));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(240));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = no_jitter();

        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(3600));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(3600));
    }

    #[test]
    fn test_next_run_at_monotone() {
        let policy = no_jitter();
        let now = Utc::now();

        for attempts in 0..20 {
            let current = policy.next_run_at(now, attempts);
            let next = policy.next_run_at(now, attempts + 1);
            assert!(next >= current, "delay shrank at attempt {}", attempts);
        }
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            jitter: 0.5,
            ..Default::default()
        };
        let now = Utc::now();

        for _ in 0..50 {
            let run_at = policy.next_run_at(now, 1);
            let delay = (run_at - now).num_seconds();
            assert!((60..=90).contains(&delay), "delay {} out of bounds", delay);
        }
    }

    #[test]
    fn test_exhaustion() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..Default::default()
        };

        assert!(!policy.is_exhausted(0));
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }
}
