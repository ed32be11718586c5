// crates/resilience/src/backoff.rs
//! Reconnect backoff for long-lived connections
//!
//! Follows EventSource conventions: the server may set the base reconnect delay with a
//! `retry:` hint, consecutive failures grow the delay exponentially up to a cap, and any
//! successful connection resets the sequence.

use crate::retry::RetryPolicy;
use log::debug;
use std::time::Duration;

/// Stateful reconnect delay tracker for one connection
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    policy: RetryPolicy,
    failures: usize,
}

impl ReconnectBackoff {
    /// Creates a tracker; the policy's attempt limit is ignored, reconnects never give up
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Applies a server-provided base delay
    pub fn set_server_hint(&mut self, delay: Duration) {
        debug!("Server reconnect hint: {:?}", delay);
        let max = self.policy.max_delay().max(delay);
        self.policy = self
            .policy
            .clone()
            .with_initial_delay(delay)
            .with_max_delay(max);
    }

    /// Records a failed or dropped connection and returns the delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.policy.delay_for_attempt(self.failures)
    }

    /// Marks the connection as healthy again
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures since the last reset
    pub fn failures(&self) -> usize {
        self.failures
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(
            RetryPolicy::new(usize::MAX)
                .with_initial_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(30))
                .with_jitter(false),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> ReconnectBackoff {
        ReconnectBackoff::new(
            RetryPolicy::new(usize::MAX)
                .with_initial_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(4))
                .with_jitter(false),
        )
    }

    #[test]
    fn test_delay_grows_until_cap() {
        let mut b = backoff();
        assert_eq!(b.next_delay(), Duration::from_millis(500));
        assert_eq!(b.next_delay(), Duration::from_millis(1000));
        assert_eq!(b.next_delay(), Duration::from_millis(2000));
        assert_eq!(b.next_delay(), Duration::from_millis(4000));
        assert_eq!(b.next_delay(), Duration::from_millis(4000));
        assert_eq!(b.failures(), 5);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut b = backoff();
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.failures(), 0);
        assert_eq!(b.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_server_hint_sets_base() {
        let mut b = backoff();
        b.set_server_hint(Duration::from_secs(10));
        assert_eq!(b.next_delay(), Duration::from_secs(10));
        // the cap never drops below the hint
        assert_eq!(b.next_delay(), Duration::from_secs(10));
    }
}
