//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - In-memory rewards and webhook stores
//! - `postgres` - sqlx-backed stores
//! - `resilience` - Circuit breakers, breaker registries, retry executor
//! - `suppliers` - External voucher connectors (HTTP, mock)
//! - `webhook` - Outbound webhook senders (HTTP, recording)
//! - `events` - Event sinks
//! - `alerts` - Budget alert sinks
//! - `http` - axum budget API

pub mod alerts;
pub mod events;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod resilience;
pub mod suppliers;
pub mod webhook;

pub use alerts::{CompositeAlertSink, EventAlertSink, RecordingAlertSink, TracingAlertSink};
pub use events::RecordingEventSink;
pub use memory::{InMemoryRewardsStore, InMemoryWebhookStore};
pub use postgres::{PostgresRewardsStore, PostgresWebhookStore};
pub use resilience::{CircuitBreakerRegistry, ConnectorRegistry, RetryPolicy};
pub use suppliers::{HttpConnectorConfig, HttpVoucherConnector, MockVoucherConnector};
pub use webhook::{HttpWebhookSender, RecordingWebhookSender};
