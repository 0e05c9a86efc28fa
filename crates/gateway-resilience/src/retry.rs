//! Retry policy with exponential backoff.
//!
//! Retries only transport-level failures (see [`GatewayError::is_retryable`]);
//! application errors from the upstream are returned on the first attempt.

use gateway_core::{GatewayError, GatewayResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub min_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
    /// Jitter factor (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

/// Retry policy implementation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: RetryConfig {
                max_attempts: config.max_attempts.max(1),
                max_delay: config.max_delay.max(config.min_delay),
                ..config
            },
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Calculate the delay after a failed attempt (0-indexed).
    ///
    /// Never exceeds `max_delay`, jitter included.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let min = self.config.min_delay.as_millis() as f64;
        let max = self.config.max_delay.as_millis() as f64;
        let delay = (min * self.config.multiplier.powi(attempt as i32)).clamp(min, max);

        if self.config.jitter <= 0.0 {
            return Duration::from_millis(delay as u64);
        }

        let jitter_range = delay * self.config.jitter;
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        Duration::from_millis((delay + jitter).clamp(0.0, max) as u64)
    }

    /// Execute an operation with retry logic
    ///
    /// # Errors
    /// Returns the last error if all attempts fail, or the first
    /// non-retryable error
    pub async fn execute<F, Fut, T>(&self, operation: F) -> GatewayResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation and report how it ended
    pub async fn execute_with_outcome<F, Fut, T>(&self, operation: F) -> RetryResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let max_attempts = self.config.max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt = attempt, "Retry succeeded");
                    }
                    return RetryResult::Success(value);
                }
                Err(error) if !error.is_retryable() => {
                    return RetryResult::NonRetryable { error };
                }
                Err(error) if attempt >= max_attempts => {
                    warn!(
                        attempts = attempt,
                        error = %error,
                        "Retry budget exhausted"
                    );
                    return RetryResult::Failed {
                        error,
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    let delay = self.delay_for_attempt(attempt - 1);
                    debug!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after transport error"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

/// Result of a retry operation
#[derive(Debug)]
pub enum RetryResult<T> {
    /// Operation succeeded
    Success(T),
    /// Every attempt failed with a retryable error
    Failed {
        /// The final error
        error: GatewayError,
        /// Number of attempts made
        attempts: u32,
    },
    /// Operation failed with non-retryable error
    NonRetryable {
        /// The error
        error: GatewayError,
    },
}

impl<T> RetryResult<T> {
    /// Convert to a Result
    ///
    /// # Errors
    /// Returns the error if the operation failed
    pub fn into_result(self) -> GatewayResult<T> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failed { error, .. } | Self::NonRetryable { error } => Err(error),
        }
    }

    /// Check if the operation succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Builder for retry policy
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    config: RetryConfig,
}

impl RetryPolicyBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total attempt budget
    #[must_use]
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    /// Set the first backoff delay
    #[must_use]
    pub fn min_delay(mut self, delay: Duration) -> Self {
        self.config.min_delay = delay;
        self
    }

    /// Set max delay
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.config.multiplier = multiplier;
        self
    }

    /// Set jitter factor
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.config.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Build the policy
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicyBuilder::new()
            .max_attempts(max_attempts)
            .min_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .build()
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicyBuilder::new()
            .min_delay(Duration::from_secs(4))
            .max_delay(Duration::from_secs(10))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10)); // Capped
        assert_eq!(policy.delay_for_attempt(9), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicyBuilder::new()
            .min_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(400))
            .jitter(0.5)
            .build();

        for _ in 0..50 {
            let delay = policy.delay_for_attempt(0);
            assert!(delay >= Duration::from_millis(50) && delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_jitter_never_exceeds_max_delay() {
        let policy = RetryPolicyBuilder::new()
            .min_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(100))
            .jitter(1.0)
            .build();

        for attempt in 0..50 {
            assert!(policy.delay_for_attempt(attempt % 4) <= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_degenerate_config_is_normalized() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 0,
            min_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(1),
            ..Default::default()
        });
        assert_eq!(policy.config().max_attempts, 1);
        assert_eq!(policy.config().max_delay, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let policy = fast_policy(3);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let result: GatewayResult<u32> = policy
            .execute(|| {
                let c = Arc::clone(&counter_clone);
                async move {
                    c.fetch_add(1, Ordering::Relaxed);
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let policy = fast_policy(3);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let result: GatewayResult<u32> = policy
            .execute(|| {
                let c = Arc::clone(&counter_clone);
                async move {
                    if c.fetch_add(1, Ordering::Relaxed) < 2 {
                        Err(GatewayError::connection("connection refused"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_reports_attempts() {
        let policy = fast_policy(3);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let outcome: RetryResult<u32> = policy
            .execute_with_outcome(|| {
                let c = Arc::clone(&counter_clone);
                async move {
                    c.fetch_add(1, Ordering::Relaxed);
                    Err(GatewayError::timeout(Duration::from_secs(1)))
                }
            })
            .await;

        match outcome {
            RetryResult::Failed { attempts, error } => {
                assert_eq!(attempts, 3);
                assert!(error.is_retryable());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_http_errors_are_not_retried() {
        let policy = fast_policy(3);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let outcome: RetryResult<u32> = policy
            .execute_with_outcome(|| {
                let c = Arc::clone(&counter_clone);
                async move {
                    c.fetch_add(1, Ordering::Relaxed);
                    Err(GatewayError::upstream_http(503, "loading model"))
                }
            })
            .await;

        assert!(matches!(outcome, RetryResult::NonRetryable { .. }));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts() {
        let policy = RetryPolicyBuilder::new()
            .max_attempts(3)
            .min_delay(Duration::from_secs(4))
            .max_delay(Duration::from_secs(10))
            .build();
        let start = tokio::time::Instant::now();

        let result: GatewayResult<()> = policy
            .execute(|| async { Err(GatewayError::connection("refused")) })
            .await;

        assert!(result.is_err());
        // 4s after the first attempt, 8s after the second, none after the last
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(12) && elapsed < Duration::from_secs(13));
    }
}
