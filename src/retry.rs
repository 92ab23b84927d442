//! Bounded retry with exponential backoff for stream attempts.
//!
//! Wraps "start an attempt" in a retry loop. Failures classified as
//! retryable by [`CoordinatorError::is_retryable`] wait
//! `min(max_delay, initial_delay * 2^attempt)` and try again, up to
//! `max_retries` retries after the initial attempt; anything else
//! propagates immediately as fatal.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult};

/// Backoff schedule for one logical submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }

    /// Delay to wait after a failure of the given zero-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let delay = self.initial_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

impl From<&CoordinatorConfig> for RetryPolicy {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.initial_delay,
            max_delay: config.max_delay,
        }
    }
}

/// Run an attempt closure under the policy.
///
/// The closure receives the zero-based attempt number. Retry state lives
/// entirely within this call and is dropped on return.
pub async fn run_with_retry<T, F, Fut>(policy: RetryPolicy, mut attempt_fn: F) -> CoordinatorResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = CoordinatorResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries && e.is_retryable() => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    code = e.error_code(),
                    error = %e,
                    "stream attempt failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn transient() -> CoordinatorError {
        CoordinatorError::Transport(TransportError::ConnectionFailed {
            url: "http://engine".to_string(),
            message: "connection reset".to_string(),
        })
    }

    #[test]
    fn test_delay_schedule_at_defaults() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_bounded_by_max() {
        let policy = RetryPolicy::new(8, Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for(31), Duration::from_secs(10));
    }

    #[test]
    fn test_policy_from_config() {
        let config = CoordinatorConfig::default();
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_succeeds_on_first_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10));
        let result = run_with_retry(policy, |_| async { Ok::<_, CoordinatorError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let result = run_with_retry(policy, move |attempt| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(transient())
                } else {
                    Ok("report")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "report");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_retries_and_surfaces_last_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(10));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let result: CoordinatorResult<()> = run_with_retry(policy, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            }
        })
        .await;
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            CoordinatorError::Transport(_)
        ));
        // initial attempt + 2 retries
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_short_circuits() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let result: CoordinatorResult<()> = run_with_retry(policy, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CoordinatorError::EmptyReport)
            }
        })
        .await;
        assert!(matches!(result.unwrap_err(), CoordinatorError::EmptyReport));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
