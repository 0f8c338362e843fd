//! Exponential-backoff retry shared by the presign, download and delete
//! flows.

use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{info, warn};

/// Classifies an error as transient (worth another attempt) or permanent.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry configuration: `max_attempts` total calls, with the delay before
/// attempt `n + 1` equal to `base_delay * 2^(n - 1)`.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// attempt ceiling is reached. The last error is returned on exhaustion.
    pub async fn execute<F, Fut, T, E>(&self, operation: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 1;

        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    warn!(operation, error = %err, "permanent failure, not retrying");
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    warn!(operation, attempt, error = %err, "giving up after max attempts");
                    return Err(err);
                }
                Err(err) => {
                    let backoff = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        error = %err,
                        backoff_ms = backoff.as_millis() as u64,
                        "call failed, retrying after backoff"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
