use crate::remote::RemoteError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one); `None` retries forever
    pub max_attempts: Option<u32>,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry (1.0 keeps it fixed)
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Create an unbounded retry configuration with a fixed delay
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            max_attempts: None,
            initial_delay,
            max_delay: initial_delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Stop after `max_attempts` attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the maximum delay between retries
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Preset: wait out rate limiting indefinitely with a fixed pause
    pub fn rate_limit(wait: Duration) -> Self {
        Self::new(wait)
    }

    /// Calculate the delay for a given attempt number (0-indexed)
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);

        let delay = Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64);
        delay.min(self.max_delay.max(self.initial_delay))
    }

    /// Run a remote operation, retrying only while it reports rate limiting
    pub async fn run<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        with_retry_if(self, operation_name, operation, RemoteError::is_transient).await
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::rate_limit(Duration::from_secs(30))
    }
}

/// Execute an async operation with retries, using a predicate to determine if retry is appropriate
///
/// Errors the predicate rejects are returned immediately. When a bounded
/// configuration runs out of attempts the last error is returned.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;

    loop {
        // Wait before retry (except for first attempt)
        let delay = config.delay_for_attempt(attempt);
        if !delay.is_zero() {
            debug!(
                "{}: Retry attempt {} after {:?}",
                operation_name,
                attempt + 1,
                delay
            );
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{}: Succeeded on attempt {}", operation_name, attempt + 1);
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    debug!(
                        "{}: Error is not retryable, failing immediately: {}",
                        operation_name, e
                    );
                    return Err(e);
                }

                attempt = attempt.saturating_add(1);
                match config.max_attempts {
                    Some(max) if attempt >= max => {
                        warn!(
                            "{}: All {} attempts failed. Last error: {}",
                            operation_name, max, e
                        );
                        return Err(e);
                    }
                    _ => {
                        warn!(
                            "{}: Attempt {} failed ({}), retrying after {:?}",
                            operation_name,
                            attempt,
                            e,
                            config.delay_for_attempt(attempt)
                        );
                    }
                }
            }
        }
    }
}
