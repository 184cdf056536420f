//! Retry policy for client calls.
//!
//! # Design Decisions
//! - GET is idempotent and is retried after a timeout
//! - SET is never retried after a timeout; the first attempt may already
//!   have been applied
//! - Version conflicts are retried only by read-modify-write helpers that
//!   recompute the update from a fresh snapshot

use rand::Rng;
use std::time::Duration;

use crate::config::ClientConfig;

/// Upper bound of the random extra added to each delay, as a fraction of it.
const JITTER_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_attempts: config.max_retry_attempts,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// Whether retry number `attempt` (1-based) is allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based); attempt 0 waits nothing.
    ///
    /// Doubles from `base_delay_ms` and stops growing at `max_delay_ms`. A
    /// random extra of up to a tenth keeps clients that share a channel
    /// from retrying in lockstep.
    pub fn delay(&self, attempt: u32) -> Duration {
        let Some(doublings) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let ceiling = Duration::from_millis(self.max_delay_ms);
        let step = 1u32
            .checked_shl(doublings)
            .and_then(|factor| Duration::from_millis(self.base_delay_ms).checked_mul(factor))
            .map_or(ceiling, |delay| delay.min(ceiling));
        step + step.mul_f64(rand::thread_rng().gen_range(0.0..JITTER_FRACTION))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_delay_ms: u64, max_delay_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms,
            max_delay_ms,
        }
    }

    #[test]
    fn default_policy_follows_client_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert!(policy.allows(5));
        assert!(!policy.allows(6));
        assert!(policy.delay(1) >= Duration::from_millis(100));
    }

    #[test]
    fn zero_attempts_never_retry() {
        let config = ClientConfig {
            max_retry_attempts: 0,
            ..ClientConfig::default()
        };
        assert!(!RetryPolicy::from_config(&config).allows(1));
    }

    #[test]
    fn delay_doubles_then_caps() {
        let policy = policy(100, 1000);
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert!((100..110).contains(&policy.delay(1).as_millis()));
        assert!((200..220).contains(&policy.delay(2).as_millis()));
        assert!((800..880).contains(&policy.delay(4).as_millis()));
        assert!((1000..1100).contains(&policy.delay(30).as_millis()));
    }

    #[test]
    fn huge_attempt_counts_stay_at_the_ceiling() {
        let policy = policy(u64::MAX / 2, 5000);
        let delay = policy.delay(u32::MAX);
        assert!(delay >= Duration::from_millis(5000));
        assert!(delay < Duration::from_millis(5500));
    }
}
