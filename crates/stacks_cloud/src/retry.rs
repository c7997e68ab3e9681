//! Throttling-aware retry for remote calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{CloudError, CloudResult};

/// Exponential backoff schedule.
///
/// The default waits 3, 6, 12 and 24 seconds; the fifth consecutive
/// throttle is returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Something that can wait.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `operation`, retrying errors accepted by `is_retryable` on `policy`'s schedule.
///
/// Each call starts with a fresh attempt counter. Errors that are not
/// retryable, and the error after the last retry, are returned unchanged.
pub async fn retry_with<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    is_retryable: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, E>> + Send,
    C: Fn(&E) -> bool + Send,
    E: Display + Send,
    T: Send,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && is_retryable(&err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Being throttled ({}). Retrying after {} seconds..",
                    err,
                    delay.as_secs()
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// [`retry_with`] for remote calls, retrying throttling errors only.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation: F,
) -> CloudResult<T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = CloudResult<T>> + Send,
    T: Send,
{
    retry_with(policy, sleeper, CloudError::is_throttling, operation).await
}

/// Blocking counterpart of [`retry`] for synchronous callers such as template functions.
pub fn retry_blocking<T, F>(
    policy: &RetryPolicy,
    sleep: &dyn Fn(Duration),
    mut operation: F,
) -> CloudResult<T>
where
    F: FnMut() -> CloudResult<T>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && err.is_throttling() => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Being throttled ({}). Retrying after {} seconds..",
                    err,
                    delay.as_secs()
                );
                sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
