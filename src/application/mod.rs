//! Application layer - services that orchestrate domain operations over ports.
//!
//! - `ledger` - BudgetLedger: reserve / charge / release / topup / reconcile
//! - `issuance` - IssuanceService: grant, process, redeem, cancel
//! - `rewards` - RewardHandler strategies and their registry
//! - `background` - ExpirySweeper and WebhookDispatcher

pub mod background;
pub mod issuance;
pub mod ledger;
pub mod rewards;

pub use background::{
    BackgroundTask, DispatcherSettings, DispatcherStats, ExpirySweeper, SweepStats,
    SweeperSettings, WebhookDispatcher,
};
pub use issuance::{GrantOutcome, GrantRewardCommand, IssuanceService};
pub use ledger::{
    BudgetLedger, CreateBudgetCommand, LedgerCommand, ReserveOutcome, TopupCommand,
    DEFAULT_ENTRY_LIMIT, MAX_ENTRY_LIMIT,
};
pub use rewards::{HandlerDefaults, HandlerRegistry, ProcessContext, RewardHandler};
