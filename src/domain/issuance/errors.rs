//! Issuance-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound / RewardNotFound | 404 |
//! | WrongStatus / InvalidTransition / Expired | 409 |
//! | InvalidCode | 422 |
//! | Reward | depends on the reward failure |
//! | Ledger | see `LedgerError` |
//! | Storage | 500 |

use thiserror::Error;

use crate::domain::budget::LedgerError;
use crate::domain::foundation::{DomainError, ErrorCode, IssuanceId, RewardId, ValidationError};
use crate::domain::reward::RewardError;

use super::IssuanceStatus;

/// Errors raised while granting, processing, redeeming, or cancelling an
/// issuance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssuanceError {
    #[error("Issuance not found: {0}")]
    NotFound(IssuanceId),

    #[error("Reward not found: {0}")]
    RewardNotFound(RewardId),

    #[error("Issuance {id} is {actual}, expected {expected}")]
    WrongStatus {
        id: IssuanceId,
        expected: IssuanceStatus,
        actual: IssuanceStatus,
    },

    #[error("Invalid issuance transition: {0}")]
    InvalidTransition(ValidationError),

    #[error("Redemption code does not match")]
    InvalidCode,

    #[error("Issuance {0} has expired")]
    Expired(IssuanceId),

    #[error("Reward processing failed: {0}")]
    Reward(#[from] RewardError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    #[error("Issuance storage failure: {0}")]
    Storage(DomainError),
}

impl IssuanceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            IssuanceError::NotFound(_) => ErrorCode::IssuanceNotFound,
            IssuanceError::RewardNotFound(_) => ErrorCode::RewardNotFound,
            IssuanceError::WrongStatus { .. } => ErrorCode::IssuanceNotProcessable,
            IssuanceError::InvalidTransition(_) => ErrorCode::InvalidStateTransition,
            IssuanceError::InvalidCode => ErrorCode::InvalidRedemptionCode,
            IssuanceError::Expired(_) => ErrorCode::IssuanceExpired,
            IssuanceError::Reward(e) => e.code(),
            IssuanceError::Ledger(e) => e.code(),
            IssuanceError::Validation(_) => ErrorCode::ValidationFailed,
            IssuanceError::Storage(e) => e.code,
        }
    }
}

impl From<ValidationError> for IssuanceError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidTransition { .. } => IssuanceError::InvalidTransition(err),
            other => IssuanceError::Validation(other),
        }
    }
}

impl From<DomainError> for IssuanceError {
    fn from(err: DomainError) -> Self {
        IssuanceError::Storage(err)
    }
}

impl From<IssuanceError> for DomainError {
    fn from(err: IssuanceError) -> Self {
        match err {
            IssuanceError::Storage(inner) => inner,
            IssuanceError::Ledger(inner) => inner.into(),
            other => DomainError::new(other.code(), other.to_string()),
        }
    }
}
