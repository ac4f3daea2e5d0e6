//! Issuance status state machine.
//!
//! ```text
//! reserved ──► issued ──► redeemed
//!    │           ├──────► expired
//!    │           └──────► cancelled
//!    ├──► cancelled
//!    └──► failed
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DomainError, ErrorCode, StateMachine};

/// Lifecycle state of one reward grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceStatus {
    /// Budget is held; no reward artifact yet.
    Reserved,

    /// Reward artifact delivered to the customer.
    Issued,

    /// Customer used the reward. The reservation is charged.
    Redeemed,

    /// Validity window lapsed. The reservation is released.
    Expired,

    /// Withdrawn before use. The reservation is released.
    Cancelled,

    /// Processing failed. The reservation stays held for review.
    Failed,
}

impl IssuanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceStatus::Reserved => "reserved",
            IssuanceStatus::Issued => "issued",
            IssuanceStatus::Redeemed => "redeemed",
            IssuanceStatus::Expired => "expired",
            IssuanceStatus::Cancelled => "cancelled",
            IssuanceStatus::Failed => "failed",
        }
    }
}

impl StateMachine for IssuanceStatus {
    fn valid_transitions(&self) -> &'static [Self] {
        use IssuanceStatus::*;
        match self {
            Reserved => &[Issued, Cancelled, Failed],
            Issued => &[Redeemed, Expired, Cancelled],
            Redeemed | Expired | Cancelled | Failed => &[],
        }
    }
}

impl fmt::Display for IssuanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssuanceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(IssuanceStatus::Reserved),
            "issued" => Ok(IssuanceStatus::Issued),
            "redeemed" => Ok(IssuanceStatus::Redeemed),
            "expired" => Ok(IssuanceStatus::Expired),
            "cancelled" => Ok(IssuanceStatus::Cancelled),
            "failed" => Ok(IssuanceStatus::Failed),
            other => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Invalid issuance status: {}", other),
            )),
        }
    }
}
