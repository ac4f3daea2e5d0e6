//! Pre-loaded voucher codes claimed one at a time by pooled rewards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    DomainError, ErrorCode, IssuanceId, RewardId, TenantId, Timestamp, VoucherCodeId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherCodeStatus {
    Available,
    Issued,
}

impl VoucherCodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherCodeStatus::Available => "available",
            VoucherCodeStatus::Issued => "issued",
        }
    }
}

impl fmt::Display for VoucherCodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoucherCodeStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(VoucherCodeStatus::Available),
            "issued" => Ok(VoucherCodeStatus::Issued),
            other => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Invalid voucher code status: {}", other),
            )),
        }
    }
}

/// One row of a reward's code pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherCode {
    pub id: VoucherCodeId,
    pub tenant_id: TenantId,
    pub reward_id: RewardId,
    pub code: String,
    pub status: VoucherCodeStatus,
    pub issuance_id: Option<IssuanceId>,
    pub claimed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl VoucherCode {
    pub fn available(tenant_id: TenantId, reward_id: RewardId, code: impl Into<String>) -> Self {
        Self {
            id: VoucherCodeId::new(),
            tenant_id,
            reward_id,
            code: code.into(),
            status: VoucherCodeStatus::Available,
            issuance_id: None,
            claimed_at: None,
            created_at: Timestamp::now(),
        }
    }

    /// Assigns this code to an issuance.
    pub fn claim(&mut self, issuance_id: IssuanceId) {
        self.status = VoucherCodeStatus::Issued;
        self.issuance_id = Some(issuance_id);
        self.claimed_at = Some(Timestamp::now());
    }

    pub fn is_available(&self) -> bool {
        self.status == VoucherCodeStatus::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_marks_code_issued() {
        let mut code = VoucherCode::available(TenantId::new(), RewardId::new(), "POOL-1");
        assert!(code.is_available());

        let issuance = IssuanceId::new();
        code.claim(issuance);

        assert!(!code.is_available());
        assert_eq!(code.issuance_id, Some(issuance));
        assert!(code.claimed_at.is_some());
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert_eq!(
            "issued".parse::<VoucherCodeStatus>().unwrap(),
            VoucherCodeStatus::Issued
        );
        let err = "spent".parse::<VoucherCodeStatus>().unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
