//! In-process circuit breaker.
//!
//! One instance guards one supplier. Counters live behind a single mutex; the
//! breaker is a heuristic, so a call may still slip through while another
//! caller's failure is opening the circuit.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tokio::time::Instant;

use crate::ports::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};

/// Returned instead of calling the guarded function while the circuit is open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circuit open for {name}")]
pub struct CircuitOpenError {
    pub name: String,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<Instant>,
    total_successes: u64,
    total_failures: u64,
    times_opened: u64,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
            total_successes: 0,
            total_failures: 0,
            times_opened: 0,
        }
    }
}

/// Circuit breaker backed by a mutex-guarded state record.
#[derive(Debug)]
pub struct InMemoryCircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl InMemoryCircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::closed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Runs `op` through the breaker.
    ///
    /// While the circuit is open `op` is never invoked. Every `Err` counts as
    /// a failure; use [`InMemoryCircuitBreaker::call_classified`] to ignore
    /// errors that say nothing about the supplier's health.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        E: From<CircuitOpenError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(|_| true, op).await
    }

    /// Like [`InMemoryCircuitBreaker::call`], recording a failure only when
    /// `is_failure` says so. Other errors leave the counters untouched.
    pub async fn call_classified<T, E, F, Fut, C>(&self, is_failure: C, op: F) -> Result<T, E>
    where
        E: From<CircuitOpenError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
    {
        if !self.should_allow() {
            return Err(CircuitOpenError {
                name: self.name.clone(),
            }
            .into());
        }

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                if is_failure(&e) {
                    self.record_failure();
                }
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open(&self, s: &mut BreakerState) {
        s.state = CircuitState::Open;
        s.consecutive_successes = 0;
        s.times_opened += 1;
        tracing::warn!(
            breaker = %self.name,
            failures = s.consecutive_failures,
            "Circuit opened"
        );
    }
}

impl CircuitBreaker for InMemoryCircuitBreaker {
    fn state(&self) -> CircuitState {
        self.lock().state
    }

    fn should_allow(&self) -> bool {
        let mut s = self.lock();
        match s.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = s
                    .last_failure_at
                    .map(|at| at.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    s.state = CircuitState::HalfOpen;
                    s.consecutive_successes = 0;
                    tracing::info!(breaker = %self.name, "Circuit half-open, probing");
                }
                elapsed
            }
        }
    }

    fn record_success(&self) {
        let mut s = self.lock();
        s.total_successes += 1;
        match s.state {
            CircuitState::Closed => s.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                s.consecutive_successes += 1;
                if s.consecutive_successes >= self.config.success_threshold {
                    s.state = CircuitState::Closed;
                    s.consecutive_failures = 0;
                    s.consecutive_successes = 0;
                    tracing::info!(breaker = %self.name, "Circuit closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut s = self.lock();
        s.total_failures += 1;
        s.last_failure_at = Some(Instant::now());
        match s.state {
            CircuitState::Closed => {
                s.consecutive_failures += 1;
                if s.consecutive_failures >= self.config.failure_threshold {
                    self.open(&mut s);
                }
            }
            CircuitState::HalfOpen => {
                s.consecutive_failures += 1;
                self.open(&mut s);
            }
            CircuitState::Open => {}
        }
    }

    fn reset(&self) {
        let mut s = self.lock();
        s.state = CircuitState::Closed;
        s.consecutive_failures = 0;
        s.consecutive_successes = 0;
        s.last_failure_at = None;
        tracing::info!(breaker = %self.name, "Circuit manually reset");
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        let s = self.lock();
        let time_until_half_open = match (s.state, s.last_failure_at) {
            (CircuitState::Open, Some(at)) => {
                Some(self.config.recovery_timeout.saturating_sub(at.elapsed()))
            }
            _ => None,
        };
        CircuitBreakerMetrics {
            state: Some(s.state),
            total_successes: s.total_successes,
            total_failures: s.total_failures,
            times_opened: s.times_opened,
            current_failures: s.consecutive_failures,
            current_successes: s.consecutive_successes,
            time_until_half_open,
        }
    }
}
