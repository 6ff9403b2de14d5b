//! Retry with backoff.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::ErrorHandlerConfig;

/// Retry policy for a failing operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Double the delay on every retry.
    pub exponential: bool,
}

impl RetryPolicy {
    /// Builds the policy described by `config`, optionally overriding the retry count.
    pub fn from_config(config: &ErrorHandlerConfig, max_retries: Option<u32>) -> Self {
        Self {
            max_retries: max_retries.unwrap_or(config.max_retries),
            base_delay: config.retry_delay(),
            max_delay: config.max_retry_delay(),
            exponential: config.exponential_backoff,
        }
    }

    /// Calculate the delay before retry number `retry` (zero-based).
    ///
    /// Uses `base_delay * 2^retry` when exponential, capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        if !self.exponential {
            return self.base_delay.min(self.max_delay);
        }
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Outcome of [`run_with_retry`].
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result: the first success, or the last error.
    pub result: Result<T, E>,
    /// Number of times the operation was invoked.
    pub attempts: u32,
}

/// Runs `operation` up to `policy.max_retries + 1` times.
///
/// Stops early on success, or as soon as `should_retry` rejects an error.
pub async fn run_with_retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => return RetryOutcome { result: Ok(value), attempts: retry + 1 },
            Err(e) => {
                if retry >= policy.max_retries || !should_retry(&e) {
                    return RetryOutcome { result: Err(e), attempts: retry + 1 };
                }

                let delay = policy.delay_for(retry);
                debug!(
                    attempt = retry + 1,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
        }
    }
}
