//! Bounded retry with exponential backoff for transport calls.
//!
//! Disabled unless configured: a policy with `max_retries == 0` runs the
//! operation exactly once.

use crate::config::TransportConfig;
use crate::error::TransportError;
use std::time::Duration;
use tracing::warn;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl From<&TransportConfig> for RetryConfig {
    fn from(config: &TransportConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.retry_delay,
            ..Default::default()
        }
    }
}

impl RetryConfig {
    /// Set max retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set max delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Disable jitter.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Retry policy for transport operations.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Calculate the delay before retry number `attempt` (zero based).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(attempt.min(i32::MAX as u32) as i32);

        let delay_ms = base_delay.min(self.config.max_delay.as_millis() as f64);

        let final_delay = if self.config.jitter {
            // Up to 25% jitter
            delay_ms * (1.0 + rand::random::<f64>() * 0.25)
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Check if an error should be retried.
    #[must_use]
    pub const fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        attempt < self.config.max_retries && error.is_retryable()
    }

    /// Execute an async operation with retries.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once
    /// retries are exhausted.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(&error, attempt) {
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    warn!(attempt, ?delay, %error, "Retrying Vault request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Get the maximum number of retries.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::default()
                .with_max_retries(max_retries)
                .with_initial_delay(Duration::from_millis(1))
                .without_jitter(),
        )
    }

    #[test]
    fn test_default_never_retries() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries(), 0);
        assert!(!policy.should_retry(&TransportError::RateLimited, 0));
    }

    #[test]
    fn test_from_transport_config() {
        let transport = TransportConfig::default().with_retries(3, Duration::from_millis(50));
        let config = RetryConfig::from(&transport);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_delay_calculation_no_jitter() {
        let policy = RetryPolicy::new(RetryConfig::default().without_jitter());

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .without_jitter()
                .with_max_delay(Duration::from_millis(150)),
        );
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(150));
    }

    #[test]
    fn test_should_retry() {
        let policy = fast(3);

        assert!(policy.should_retry(&TransportError::RateLimited, 0));
        assert!(policy.should_retry(&TransportError::RateLimited, 2));
        assert!(!policy.should_retry(&TransportError::RateLimited, 3));
        assert!(!policy.should_retry(&TransportError::NotFound("x".to_string()), 0));
    }

    #[tokio::test]
    async fn test_execute_recovers_from_transient_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast(2)
            .execute(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransportError::Unavailable("503".to_string()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_execute_stops_on_permanent_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast(5)
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::PermissionDenied("x".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast(2)
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::RateLimited)
            })
            .await;

        assert!(matches!(result, Err(TransportError::RateLimited)));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
