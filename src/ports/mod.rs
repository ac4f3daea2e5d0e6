//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `RewardsStore` / `RewardsTx` - Budgets, ledger, issuances, catalog, code pools
//! - `WebhookStore` - Webhook endpoints and delivery attempts
//!
//! ## Outbound Ports
//!
//! - `VoucherConnector` - External voucher suppliers
//! - `WebhookSender` - Signed HTTP POSTs
//! - `AlertSink` - Budget utilization alerts
//! - `EventSink` - Domain event hand-off
//!
//! ## Resilience Ports
//!
//! - `CircuitBreaker` - Fail-fast gate per supplier

mod alert_sink;
mod circuit_breaker;
mod event_sink;
mod rewards_store;
mod voucher_connector;
mod webhook_sender;
mod webhook_store;

pub use alert_sink::AlertSink;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
pub use event_sink::EventSink;
pub use rewards_store::{RewardsStore, RewardsTx};
pub use voucher_connector::{
    ConnectorError, VoucherConnector, VoucherRequest, VoucherResponse, VoucherStatus,
};
pub use webhook_sender::{WebhookRequest, WebhookResponse, WebhookSender};
pub use webhook_store::WebhookStore;
