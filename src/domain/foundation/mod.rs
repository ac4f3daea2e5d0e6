//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, enums, and error types
//! that form the vocabulary of the loyalty core.

mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{
    BudgetId, CampaignId, CustomerId, DeliveryAttemptId, IssuanceId, LedgerEntryId, RewardId,
    TenantId, VoucherCodeId, WebhookId,
};
pub use money::{ensure_positive, Currency};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
