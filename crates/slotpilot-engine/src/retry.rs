//! Bounded retry for transient failures
//!
//! One policy serves every call site. A call site only chooses which errors
//! count as retryable; attempt budget and backoff come from configuration.

use crate::error::{BookingError, DriverError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Errors the retry executor knows how to classify and escalate
pub trait RetryableError: Sized {
    /// Whether another attempt may succeed
    fn is_transient(&self) -> bool;

    /// Terminal error reported once the attempt budget is spent
    fn exhausted(step: &str, attempts: u32, last: Self) -> Self;
}

impl RetryableError for BookingError {
    fn is_transient(&self) -> bool {
        BookingError::is_transient(self)
    }

    fn exhausted(step: &str, attempts: u32, last: Self) -> Self {
        BookingError::Timeout {
            step: step.to_string(),
            detail: format!("gave up after {attempts} attempts: {last}"),
        }
    }
}

/// Retry configuration
///
/// Stateless; shared by reference and never mutated per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    pub base_delay_ms: u64,
    /// Factor applied to the delay after each failed attempt
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay, in milliseconds
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Create a policy
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_multiplier: f64) -> Self {
        let base_delay_ms = u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX);
        Self {
            max_attempts,
            base_delay_ms,
            backoff_multiplier,
            max_delay_ms: base_delay_ms.saturating_mul(16).max(base_delay_ms),
        }
    }

    /// Single attempt, no retries
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    /// With delay cap
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay_ms = u64::try_from(max_delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Validate the policy
    ///
    /// # Errors
    /// `BookingError::InvalidConfiguration` for a zero attempt budget or a
    /// multiplier below 1
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.max_attempts == 0 {
            return Err(BookingError::InvalidConfiguration(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(BookingError::InvalidConfiguration(format!(
                "retry backoff multiplier must be >= 1, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let raw = self.base_delay_ms as f64 * factor;
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped.round() as u64)
    }

    /// Run `op`, retrying transient errors
    ///
    /// # Errors
    /// The first terminal error, or `E::exhausted` once all attempts failed
    /// transiently
    pub async fn run<T, E, F, Fut>(&self, step: &str, op: F) -> Result<T, E>
    where
        E: RetryableError + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(step, E::is_transient, op).await
    }

    /// Run `op`, retrying errors for which `retryable` returns true
    ///
    /// # Errors
    /// The first non-retryable error, or `E::exhausted` once all attempts
    /// failed with retryable errors
    pub async fn run_if<T, E, C, F, Fut>(
        &self,
        step: &str,
        retryable: C,
        mut op: F,
    ) -> Result<T, E>
    where
        E: RetryableError + std::fmt::Display,
        C: Fn(&E) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let budget = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}/{}", step, attempt, budget);
                    }
                    return Ok(value);
                }
                Err(error) if !retryable(&error) => return Err(error),
                Err(error) if attempt >= budget => {
                    tracing::warn!("{} exhausted {} attempts: {}", step, budget, error);
                    return Err(E::exhausted(step, budget, error));
                }
                Err(error) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        step,
                        attempt,
                        budget,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run one driver call as a workflow step
    ///
    /// Each attempt gets its own `limit`. Driver errors are mapped through
    /// `BookingError::from_driver`, so only `NotReady` is retried.
    ///
    /// # Errors
    /// Same as [`RetryPolicy::run`], plus `Timeout` when an attempt exceeds
    /// `limit`
    pub async fn run_step<T, F, Fut>(
        &self,
        step: &'static str,
        limit: Duration,
        op: F,
    ) -> Result<T, BookingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        self.run_step_if(step, limit, BookingError::is_transient, op)
            .await
    }

    /// Like [`RetryPolicy::run_step`], retrying only what `retryable` accepts
    ///
    /// # Errors
    /// The first error `retryable` rejects, `Timeout` when an attempt
    /// exceeds `limit`, or `Timeout` once the budget is spent
    pub async fn run_step_if<T, C, F, Fut>(
        &self,
        step: &'static str,
        limit: Duration,
        retryable: C,
        mut op: F,
    ) -> Result<T, BookingError>
    where
        C: Fn(&BookingError) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        self.run_if(step, retryable, || {
            let attempt = op();
            within(step, limit, async move {
                attempt
                    .await
                    .map_err(|e| BookingError::from_driver(step, e))
            })
        })
        .await
    }
}

/// Await `future` for at most `limit`
///
/// # Errors
/// The future's own error, or `BookingError::Timeout` when the limit passes
pub async fn within<T, F>(step: &str, limit: Duration, future: F) -> Result<T, BookingError>
where
    F: Future<Output = Result<T, BookingError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(BookingError::Timeout {
            step: step.to_string(),
            detail: format!("no response within {limit:?}"),
        }),
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            backoff_multiplier: 2.0,
            max_delay_ms: 5_000,
        }
    }
}
