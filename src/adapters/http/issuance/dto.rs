//! Request and response bodies for the issuance API.

use serde::{Deserialize, Serialize};

use crate::application::GrantOutcome;
use crate::domain::budget::Reservation;
use crate::domain::foundation::{
    BudgetId, CampaignId, Currency, CustomerId, RewardId, Timestamp,
};
use crate::domain::issuance::{Issuance, IssuanceStatus};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct GrantRewardRequest {
    pub customer_id: CustomerId,
    pub reward_id: RewardId,
    pub budget_id: BudgetId,
    #[serde(default)]
    pub campaign_id: Option<CampaignId>,
    pub cost_amount: i64,
    pub face_amount: i64,
    pub currency: Currency,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedeemRequest {
    #[serde(default)]
    pub code: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct IssuanceResponse {
    pub id: String,
    pub customer_id: String,
    pub reward_id: String,
    pub budget_id: String,
    pub campaign_id: Option<String>,
    pub status: IssuanceStatus,
    pub code: Option<String>,
    pub external_ref: Option<String>,
    pub currency: Currency,
    pub cost_amount: i64,
    pub face_amount: i64,
    pub metadata: serde_json::Value,
    pub failure_reason: Option<String>,
    pub issued_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub redeemed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<Issuance> for IssuanceResponse {
    fn from(issuance: Issuance) -> Self {
        Self {
            id: issuance.id.to_string(),
            customer_id: issuance.customer_id.to_string(),
            reward_id: issuance.reward_id.to_string(),
            budget_id: issuance.budget_id.to_string(),
            campaign_id: issuance.campaign_id.map(|id| id.to_string()),
            status: issuance.status,
            code: issuance.code,
            external_ref: issuance.external_ref,
            currency: issuance.currency,
            cost_amount: issuance.cost_amount,
            face_amount: issuance.face_amount,
            metadata: issuance.metadata,
            failure_reason: issuance.failure_reason,
            issued_at: issuance.issued_at,
            expires_at: issuance.expires_at,
            redeemed_at: issuance.redeemed_at,
            created_at: issuance.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GrantResponse {
    pub issuance: IssuanceResponse,
    pub reservation: Reservation,
}

impl From<GrantOutcome> for GrantResponse {
    fn from(outcome: GrantOutcome) -> Self {
        Self {
            issuance: outcome.issuance.into(),
            reservation: outcome.reservation,
        }
    }
}
