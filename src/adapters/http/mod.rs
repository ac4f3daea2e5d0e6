//! HTTP adapters - REST API implementations.

pub mod budget;
pub mod issuance;

pub use budget::{budget_router, BudgetAppState};
pub use issuance::{issuance_router, IssuanceAppState};
