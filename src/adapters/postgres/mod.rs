//! PostgreSQL adapters - Database implementations for storage ports.
//!
//! - `PostgresRewardsStore` - Budgets, ledger, catalog, issuances and voucher pools
//! - `PostgresWebhookStore` - Webhook endpoints and delivery attempts

mod rewards_store;
mod webhook_store;

pub use rewards_store::{PostgresRewardsStore, PostgresRewardsTx};
pub use webhook_store::PostgresWebhookStore;
