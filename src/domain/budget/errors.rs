//! Ledger-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | BudgetNotFound | 404 |
//! | InvalidAmount / ExceedsReservation / CurrencyMismatch / Validation | 422 |
//! | InsufficientFunds / AlreadyCharged / NoReservation | 409 |
//! | Storage | 500 |

use thiserror::Error;

use crate::domain::foundation::{BudgetId, Currency, DomainError, ErrorCode, ValidationError};

/// Errors raised by budget ledger operations.
///
/// Every variant except `Storage` is detected before any mutation, so the
/// enclosing transaction is rolled back with nothing written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Budget not found: {0}")]
    BudgetNotFound(BudgetId),

    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(i64),

    #[error("Currency mismatch: budget uses {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    #[error("Reference {reference} has already been charged")]
    AlreadyCharged { reference: String },

    #[error("No outstanding reservation for reference {reference}")]
    NoReservation { reference: String },

    #[error("Amount {requested} exceeds reserved amount {reserved} for reference {reference}")]
    ExceedsReservation {
        reference: String,
        requested: i64,
        reserved: i64,
    },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Ledger storage failure: {0}")]
    Storage(DomainError),
}

impl LedgerError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::BudgetNotFound(_) => ErrorCode::BudgetNotFound,
            LedgerError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            LedgerError::CurrencyMismatch { .. } => ErrorCode::CurrencyMismatch,
            LedgerError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            LedgerError::AlreadyCharged { .. } => ErrorCode::AlreadyCharged,
            LedgerError::NoReservation { .. } => ErrorCode::NoReservation,
            LedgerError::ExceedsReservation { .. } => ErrorCode::InvalidAmount,
            LedgerError::Validation(_) => ErrorCode::ValidationFailed,
            LedgerError::Storage(e) => e.code,
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        LedgerError::Storage(err)
    }
}

impl From<LedgerError> for DomainError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Storage(inner) => inner,
            other => DomainError::new(other.code(), other.to_string()),
        }
    }
}
