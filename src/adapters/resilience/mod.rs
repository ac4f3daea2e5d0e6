//! Resilience primitives guarding every outbound call.
//!
//! - `InMemoryCircuitBreaker` - `CircuitBreaker` port implementation
//! - `CircuitBreakerRegistry` - one breaker per name
//! - `ConnectorRegistry` - voucher suppliers, each behind its breaker
//! - `RetryPolicy` - bounded exponential backoff with cancellation

mod circuit_breaker;
mod registry;
mod retry;

pub use circuit_breaker::{CircuitOpenError, InMemoryCircuitBreaker};
pub use registry::{CircuitBreakerRegistry, ConnectorHealth, ConnectorRegistry, GuardedConnector};
pub use retry::{Retriable, RetryError, RetryPolicy};
