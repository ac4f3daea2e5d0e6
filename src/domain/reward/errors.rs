//! Reward handler error types.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, RewardId};

/// Failures raised while turning a reservation into a reward artifact.
///
/// Any of these moves the issuance to `failed`; the budget reservation is
/// left in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardError {
    #[error("Unknown reward type: {0}")]
    UnknownType(String),

    #[error("Invalid configuration for reward {reward_id}: {reason}")]
    InvalidConfig { reward_id: RewardId, reason: String },

    #[error("Voucher pool for reward {0} is exhausted")]
    NoInventory(RewardId),

    #[error("Connector not registered: {0}")]
    ConnectorNotFound(String),

    #[error("Supplier {supplier} failed: {message}")]
    Supplier { supplier: String, message: String },

    #[error("Circuit open for {0}")]
    CircuitOpen(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Reward processing was cancelled")]
    Cancelled,

    #[error("Reward storage failure: {0}")]
    Storage(DomainError),
}

impl RewardError {
    pub fn invalid_config(reward_id: RewardId, reason: impl Into<String>) -> Self {
        RewardError::InvalidConfig {
            reward_id,
            reason: reason.into(),
        }
    }

    pub fn supplier(supplier: impl Into<String>, message: impl Into<String>) -> Self {
        RewardError::Supplier {
            supplier: supplier.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            RewardError::UnknownType(_) => ErrorCode::UnknownRewardType,
            RewardError::InvalidConfig { .. } => ErrorCode::InvalidRewardConfig,
            RewardError::NoInventory(_) => ErrorCode::NoInventory,
            RewardError::ConnectorNotFound(_) => ErrorCode::ConnectorNotFound,
            RewardError::Supplier { .. } => ErrorCode::SupplierError,
            RewardError::CircuitOpen(_) => ErrorCode::CircuitOpen,
            RewardError::RetriesExhausted { .. } => ErrorCode::RetriesExhausted,
            RewardError::Cancelled => ErrorCode::Cancelled,
            RewardError::Storage(e) => e.code,
        }
    }
}

impl From<DomainError> for RewardError {
    fn from(err: DomainError) -> Self {
        RewardError::Storage(err)
    }
}
