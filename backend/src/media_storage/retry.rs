//! Bounded exponential backoff for object writes

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tracing::warn;

/// The whole write, retries included, outlived [`WriteRetryPolicy::deadline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("write did not complete within {}s", .0.as_secs_f64())]
pub struct DeadlineExceeded(pub Duration);

/// Retry parameters for object writes
///
/// After the `n`th failed attempt the writer sleeps
/// `min(initial_delay * backoff_factor^(n-1), max_delay)`. Retry `n` is only
/// taken while `n <= max_retries`, and past `min_retries` only while the time
/// since the first attempt is below `max_retry_period`. Independently of
/// the retry count, the whole write is abandoned once `deadline` has passed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteRetryPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_factor: f64,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Total time budget once `min_retries` are spent
    pub max_retry_period: Duration,
    /// Retries granted regardless of elapsed time
    pub min_retries: u32,
    /// Hard cap on retries
    pub max_retries: u32,
    /// Wall-clock limit for all attempts and delays together
    pub deadline: Duration,
}

impl Default for WriteRetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            backoff_factor: 1.1,
            max_delay: Duration::from_secs(5),
            max_retry_period: Duration::from_secs(15),
            min_retries: 3,
            max_retries: 6,
            deadline: Duration::from_secs(20),
        }
    }
}

impl WriteRetryPolicy {
    /// Delay to wait after the `attempt`th failure (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = (self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent))
            .min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(secs)
    }

    /// Whether retry number `retry` may be taken after `elapsed`
    #[must_use]
    pub fn should_retry(&self, retry: u32, elapsed: Duration) -> bool {
        retry <= self.max_retries
            && (retry <= self.min_retries || elapsed < self.max_retry_period)
    }

    /// Runs `operation` until it succeeds, fails permanently or the budget
    /// is spent
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `operation`, or
    /// [`DeadlineExceeded`] converted into `E` when the deadline passes first
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: F,
        is_transient: impl Fn(&E) -> bool + Send,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        E: Display + Send + From<DeadlineExceeded>,
    {
        timeout(self.deadline, self.retry_loop(operation, is_transient))
            .await
            .unwrap_or_else(|_| {
                warn!(
                    deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX),
                    "Write deadline exceeded"
                );
                Err(DeadlineExceeded(self.deadline).into())
            })
    }

    async fn retry_loop<T, E, F, Fut>(
        &self,
        mut operation: F,
        is_transient: impl Fn(&E) -> bool + Send,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        E: Display + Send,
    {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) && self.should_retry(attempt, started.elapsed()) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Transient write failure, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
