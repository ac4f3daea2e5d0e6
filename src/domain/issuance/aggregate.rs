//! Issuance aggregate entity.
//!
//! An Issuance ties one budget reservation to one reward artifact. Every
//! status change goes through [`Issuance::transition`], which consults the
//! static table on [`IssuanceStatus`].

use serde::{Deserialize, Serialize};

use crate::domain::budget::LedgerRef;
use crate::domain::foundation::{
    ensure_positive, BudgetId, CampaignId, Currency, CustomerId, IssuanceId, RewardId,
    StateMachine, TenantId, Timestamp, ValidationError,
};
use crate::domain::reward::ProcessResult;

use super::{IssuanceError, IssuanceStatus};

/// Issuance aggregate - one grant of a reward to a customer.
///
/// # Invariants
///
/// - `status` only changes along the issuance state graph
/// - terminal issuances are never mutated again
/// - `cost_amount > 0` and matches the reservation recorded for
///   [`Issuance::ledger_ref`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuance {
    pub id: IssuanceId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub campaign_id: Option<CampaignId>,
    pub reward_id: RewardId,

    /// Budget the reservation was taken from.
    pub budget_id: BudgetId,

    pub status: IssuanceStatus,

    /// Customer-facing code, set once processing succeeds.
    pub code: Option<String>,

    /// Supplier transaction or pool row reference.
    pub external_ref: Option<String>,

    pub currency: Currency,

    /// Amount held against the budget.
    pub cost_amount: i64,

    /// Value shown to the customer.
    pub face_amount: i64,

    pub metadata: serde_json::Value,
    pub failure_reason: Option<String>,
    pub issued_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub redeemed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Parameters for a new reserved issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssuance {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub campaign_id: Option<CampaignId>,
    pub reward_id: RewardId,
    pub budget_id: BudgetId,
    pub currency: Currency,
    pub cost_amount: i64,
    pub face_amount: i64,
}

impl Issuance {
    /// Creates an issuance in `reserved` state.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `cost_amount` is not positive or
    /// `face_amount` is negative.
    pub fn reserve(params: NewIssuance) -> Result<Self, IssuanceError> {
        ensure_positive("cost_amount", params.cost_amount)?;
        if params.face_amount < 0 {
            return Err(ValidationError::out_of_range(
                "face_amount",
                0,
                i64::MAX,
                params.face_amount,
            )
            .into());
        }

        let now = Timestamp::now();
        Ok(Self {
            id: IssuanceId::new(),
            tenant_id: params.tenant_id,
            customer_id: params.customer_id,
            campaign_id: params.campaign_id,
            reward_id: params.reward_id,
            budget_id: params.budget_id,
            status: IssuanceStatus::Reserved,
            code: None,
            external_ref: None,
            currency: params.currency,
            cost_amount: params.cost_amount,
            face_amount: params.face_amount,
            metadata: serde_json::Value::Null,
            failure_reason: None,
            issued_at: None,
            expires_at: None,
            redeemed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Ledger reference shared by this issuance's reserve, charge and
    /// release entries.
    pub fn ledger_ref(&self) -> LedgerRef {
        LedgerRef::issuance(self.id)
    }

    /// Fails with `WrongStatus` unless the issuance is in `expected`.
    pub fn ensure_status(&self, expected: IssuanceStatus) -> Result<(), IssuanceError> {
        if self.status != expected {
            return Err(IssuanceError::WrongStatus {
                id: self.id,
                expected,
                actual: self.status,
            });
        }
        Ok(())
    }

    /// Moves to `target` if the state graph allows it.
    pub fn transition(&mut self, target: IssuanceStatus) -> Result<(), IssuanceError> {
        self.status = self.status.transition_to(target)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Records a successful handler result and moves `reserved -> issued`.
    pub fn mark_issued(&mut self, result: ProcessResult) -> Result<(), IssuanceError> {
        self.transition(IssuanceStatus::Issued)?;
        self.code = result.code;
        self.external_ref = result.external_ref;
        self.expires_at = result.expires_at;
        self.metadata = result.metadata;
        self.issued_at = Some(self.updated_at);
        Ok(())
    }

    /// Moves `reserved -> failed`, keeping the reason for operators.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), IssuanceError> {
        self.transition(IssuanceStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    pub fn mark_redeemed(&mut self) -> Result<(), IssuanceError> {
        self.transition(IssuanceStatus::Redeemed)?;
        self.redeemed_at = Some(self.updated_at);
        Ok(())
    }

    pub fn mark_expired(&mut self) -> Result<(), IssuanceError> {
        self.transition(IssuanceStatus::Expired)
    }

    pub fn cancel(&mut self) -> Result<(), IssuanceError> {
        self.transition(IssuanceStatus::Cancelled)
    }

    /// True once `expires_at` is at or before `now`.
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        self.expires_at.map(|at| !at.is_after(now)).unwrap_or(false)
    }

    /// Compares a presented code with the stored one.
    ///
    /// Both sides are trimmed and compared case-insensitively. If either side
    /// is absent there is nothing to check.
    pub fn verify_code(&self, presented: Option<&str>) -> Result<(), IssuanceError> {
        match (self.code.as_deref(), presented) {
            (Some(stored), Some(presented))
                if !stored.trim().eq_ignore_ascii_case(presented.trim()) =>
            {
                Err(IssuanceError::InvalidCode)
            }
            _ => Ok(()),
        }
    }
}
