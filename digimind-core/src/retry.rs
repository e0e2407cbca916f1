//! Bounded retry for transient failures.
//!
//! A [`RetryPolicy`] is a plain value (attempt bound plus [`Backoff`]) that
//! drives any async operation through [`RetryPolicy::execute`]. Which errors
//! are retried is decided by the [`Retryable`] trait, or by an explicit
//! predicate with [`RetryPolicy::execute_if`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Retryable;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed(Duration),
    /// `initial`, then doubling on each retry, capped at `max`.
    Exponential {
        /// Delay before the first retry.
        initial: Duration,
        /// Upper bound for any single delay.
        max: Duration,
    },
}

impl Backoff {
    /// Delay to wait after `retry` failed retries (0 for the first retry).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(retry);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// How many times to try an operation and how long to wait in between.
///
/// The default matches the hosted-API behaviour the chat front-end expects:
/// three attempts, two seconds apart.
///
/// # Example
///
/// ```rust,ignore
/// use digimind_core::RetryPolicy;
///
/// let text = RetryPolicy::default().execute(|| model.generate(request.clone())).await?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: Backoff::Fixed(Duration::from_secs(2)) }
    }
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` counts the first call; values below 1 are raised to 1.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }

    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The delay schedule.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Run `operation`, retrying errors whose [`Retryable::is_transient`] is true.
    ///
    /// Returns the first success, the first non-transient error, or the last
    /// transient error once the attempt bound is reached.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_if(|e: &E| e.is_transient(), operation).await
    }

    /// Run `operation`, retrying errors for which `should_retry` returns true.
    pub async fn execute_if<T, E, F, Fut, P>(&self, should_retry: P, mut operation: F) -> Result<T, E>
    where
        E: Display,
        P: Fn(&E) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < self.max_attempts && should_retry(&err) => {
                    let delay = self.backoff.delay(attempt - 1);
                    warn!(attempt, max_attempts = self.max_attempts, ?delay, error = %err, "transient failure, retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(attempt, error = %err, "giving up");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::ModelError;

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed(Duration::from_secs(2));
        assert_eq!(backoff.delay(0), Duration::from_secs(2));
        assert_eq!(backoff.delay(5), Duration::from_secs(2));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let backoff =
            Backoff::Exponential { initial: Duration::from_millis(100), max: Duration::from_millis(350) };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(350));
        assert_eq!(backoff.delay(40), Duration::from_millis(350));
    }

    #[test]
    fn zero_attempts_is_raised_to_one() {
        assert_eq!(RetryPolicy::new(0, Backoff::Fixed(Duration::ZERO)).max_attempts(), 1);
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<&str, ModelError> = RetryPolicy::default()
            .execute(|| async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 { Err(ModelError::Timeout) } else { Ok("done") }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), ModelError> = RetryPolicy::default()
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ModelError::RateLimited("slow down".into()))
            })
            .await;

        assert_eq!(result, Err(ModelError::RateLimited("slow down".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), ModelError> = RetryPolicy::default()
            .execute(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ModelError::Unauthorized("bad key".into()))
            })
            .await;

        assert!(matches!(result, Err(ModelError::Unauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_backoff_between_attempts() {
        let start = tokio::time::Instant::now();
        let policy = RetryPolicy::new(3, Backoff::Fixed(Duration::from_secs(2)));
        let _: Result<(), ModelError> = policy.execute(|| async { Err(ModelError::Timeout) }).await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_predicate_controls_retry() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), String> = RetryPolicy::default()
            .execute_if(
                |e: &String| e == "again",
                || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("again".to_string())
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
