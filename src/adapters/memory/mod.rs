//! In-memory adapters for tests and local development.

mod rewards_store;
mod webhook_store;

pub use rewards_store::{InMemoryRewardsStore, InMemoryRewardsTx};
pub use webhook_store::InMemoryWebhookStore;
