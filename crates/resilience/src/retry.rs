// crates/resilience/src/retry.rs
//! Retry policies with exponential backoff

use log::debug;
use std::future::Future;
use std::time::Duration;

/// How many times to try an operation and how long to wait in between
///
/// Delays grow by `multiplier` from `initial_delay` up to `max_delay`.
/// Jitter only ever shortens a delay, by at most a quarter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Includes the first try
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    use_jitter: bool,
}

impl RetryPolicy {
    /// Creates a policy with a 100 ms initial delay, doubling up to 30 s, with jitter
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            use_jitter: true,
        }
    }

    /// Sets the delay before the first retry
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the cap on any single delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor between consecutive delays
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Turns jitter on or off
    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Wait before try number `attempt`; the first try (0) never waits
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let Some(retry) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };

        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let nominal = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = nominal.min(self.max_delay.as_millis() as f64);

        let scaled = if self.use_jitter {
            // Deterministic per attempt, in [0.75, 1.0)
            capped * (0.75 + (attempt as f64 * 0.1) % 0.25)
        } else {
            capped
        };

        Duration::from_millis(scaled as u64)
    }

    /// Attempts allowed, the first one included
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Runs `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or runs out of attempts. The last error is returned unchanged.
pub async fn with_retry<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let attempts = policy.max_attempts().max(1);
    let mut tried = 1;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if tried == attempts || !is_retryable(&error) {
            return Err(error);
        }

        let delay = policy.delay_for_attempt(tried);
        debug!(
            "Try {}/{} failed ({}), next in {:?}",
            tried, attempts, error, delay
        );
        tokio::time::sleep(delay).await;
        tried += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_retry_policy_builder() {
        let policy = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(60))
            .with_multiplier(3.0)
            .with_jitter(false);

        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(200));
        assert_eq!(policy.max_delay, Duration::from_secs(60));
        assert_eq!(policy.multiplier, 3.0);
        assert!(!policy.use_jitter);
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::new(4)
            .with_initial_delay(Duration::from_millis(100))
            .with_multiplier(2.0)
            .with_jitter(false);

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(0));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_max_delay_capping() {
        let policy = RetryPolicy::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_jitter(false);

        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(usize::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_below_nominal() {
        let policy = RetryPolicy::new(5).with_initial_delay(Duration::from_millis(1000));
        for attempt in 1..5 {
            let nominal = 1000.0 * 2f64.powi(attempt as i32 - 1);
            let delay = policy.delay_for_attempt(attempt).as_millis() as f64;
            assert!(delay <= nominal);
            assert!(delay >= nominal * 0.75 - 1.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_success_after_failures() {
        let policy = RetryPolicy::new(3).with_initial_delay(Duration::from_millis(1));
        let mut call_count = 0;

        let result = with_retry(
            &policy,
            || {
                call_count += 1;
                let outcome = if call_count < 3 {
                    Err("temporary error")
                } else {
                    Ok(42)
                };
                async move { outcome }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(call_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_returns_last_error() {
        let policy = RetryPolicy::new(3).with_initial_delay(Duration::from_millis(1));
        let mut call_count = 0;

        let result: Result<i32, String> = with_retry(
            &policy,
            || {
                call_count += 1;
                let message = format!("failure {}", call_count);
                async move { Err(message) }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(call_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_stops_on_permanent_error() {
        let policy = RetryPolicy::new(5);
        let mut call_count = 0;

        let result: Result<i32, &str> = with_retry(
            &policy,
            || {
                call_count += 1;
                async { Err("not found") }
            },
            |e| *e != "not found",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(call_count, 1);
    }
}
