//! Bounded retry with exponential backoff.
//!
//! ```text
//! attempt 1 ──fail──► sleep(initial) ──► attempt 2 ──fail──► sleep(initial * m) ──► ...
//! ```
//!
//! Sleeps are capped at `max_delay`. Non-retriable errors stop the loop on
//! the spot, and cancellation interrupts both the call and the sleep.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::webhook::WebhookError;
use crate::ports::ConnectorError;

/// Errors that know whether another attempt could succeed.
pub trait Retriable {
    fn is_retriable(&self) -> bool;
}

impl Retriable for ConnectorError {
    fn is_retriable(&self) -> bool {
        ConnectorError::is_retriable(self)
    }
}

impl Retriable for WebhookError {
    fn is_retriable(&self) -> bool {
        WebhookError::is_retriable(self)
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retriable error.
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// A non-retriable error ended the loop early.
    #[error("Attempt {attempt} failed permanently: {error}")]
    Aborted { attempt: u32, error: E },

    /// The cancellation token fired.
    #[error("Cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts } => {
                *attempts
            }
            RetryError::Aborted { attempt, .. } => *attempt,
        }
    }

    /// The last error returned by the operation, if it ran at all.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Aborted { error, .. } => Some(error),
            RetryError::Cancelled { .. } => None,
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Sleep after the first failure.
    pub initial_delay: Duration,

    /// Upper bound on any single sleep.
    pub max_delay: Duration,

    /// Factor applied to the delay after each failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Sleep that follows failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Runs `op` until it succeeds, fails permanently, runs out of attempts,
    /// or `cancel` fires. `op` receives the 1-based attempt number.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: Retriable + fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with(cancel, |e: &E| e.is_retriable(), op).await
    }

    /// Like [`RetryPolicy::execute`] with an explicit classifier.
    pub async fn execute_with<T, E, F, Fut, C>(
        &self,
        cancel: &CancellationToken,
        is_retriable: C,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                result = op(attempt) => result,
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !is_retriable(&error) {
                tracing::debug!(attempt, error = %error, "Non-retriable failure, giving up");
                return Err(RetryError::Aborted { attempt, error });
            }

            if attempt >= max_attempts {
                tracing::warn!(attempts = attempt, error = %error, "Retry attempts exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.delay_for(attempt);
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retriable failure, backing off"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
