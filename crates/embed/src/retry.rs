//! Retry logic with exponential backoff for transient failures.
//!
//! Automatically retries failed operations with increasing delays to handle
//! temporary issues like network hiccups or provider rate limiting.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::EmbedError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (exponentially increased).
    #[serde(with = "crate::serde_millis")]
    pub base_delay: Duration,
    /// Maximum delay between retries.
    #[serde(with = "crate::serde_millis")]
    pub max_delay: Duration,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Result of a retried operation.
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    /// The final result (the last error if every attempt failed).
    pub result: Result<T, EmbedError>,
    /// Number of attempts made (1 = no retries needed).
    pub attempts: u32,
    /// Total duration spent on all attempts.
    pub total_duration: Duration,
}

impl<T> RetryResult<T> {
    pub fn into_result(self) -> Result<T, EmbedError> {
        self.result
    }
}

/// Execute an async operation, retrying while the error says it is transient.
///
/// Non-retryable errors ([`EmbedError::is_retryable`] returns `false`) end the
/// loop immediately.
pub async fn execute_with_retry_async<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> RetryResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, EmbedError>>,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                };
            }
            Err(error) if attempt < config.max_retries && error.is_retryable() => {
                let delay = calculate_delay(config, attempt);
                tracing::debug!(attempt, ?delay, %error, "retrying embedding call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                return RetryResult {
                    result: Err(error),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                };
            }
        }
    }
}

/// Calculate delay for a retry attempt with exponential backoff.
fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay.as_millis() as u64;
    let exponential = base.saturating_mul(2_u64.saturating_pow(attempt));
    let delay = exponential.min(config.max_delay.as_millis() as u64);

    if config.jitter {
        // Add 0-50% random jitter
        let jitter = fastrand::u64(0..=delay / 2);
        Duration::from_millis(delay + jitter)
    } else {
        Duration::from_millis(delay)
    }
}
