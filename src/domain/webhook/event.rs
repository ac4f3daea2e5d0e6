//! Domain events published to tenant webhooks.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use crate::domain::budget::BudgetAlert;
use crate::domain::foundation::{CustomerId, TenantId, Timestamp};
use crate::domain::issuance::Issuance;

use super::WebhookError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "customer.enrolled")]
    CustomerEnrolled,
    #[serde(rename = "reward.issued")]
    RewardIssued,
    #[serde(rename = "reward.redeemed")]
    RewardRedeemed,
    #[serde(rename = "reward.expired")]
    RewardExpired,
    #[serde(rename = "budget.threshold_crossed")]
    BudgetThresholdCrossed,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::CustomerEnrolled,
        EventType::RewardIssued,
        EventType::RewardRedeemed,
        EventType::RewardExpired,
        EventType::BudgetThresholdCrossed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CustomerEnrolled => "customer.enrolled",
            EventType::RewardIssued => "reward.issued",
            EventType::RewardRedeemed => "reward.redeemed",
            EventType::RewardExpired => "reward.expired",
            EventType::BudgetThresholdCrossed => "budget.threshold_crossed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| WebhookError::UnknownEvent(s.to_string()))
    }
}

/// JSON body of every webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: EventType,
    pub timestamp: Timestamp,
    pub tenant_id: TenantId,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event: EventType, tenant_id: TenantId, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: Timestamp::now(),
            tenant_id,
            data,
        }
    }

    pub fn customer_enrolled(tenant_id: TenantId, customer_id: CustomerId) -> Self {
        Self::new(
            EventType::CustomerEnrolled,
            tenant_id,
            json!({ "customer_id": customer_id }),
        )
    }

    pub fn reward_issued(issuance: &Issuance) -> Self {
        Self::for_issuance(EventType::RewardIssued, issuance)
    }

    pub fn reward_redeemed(issuance: &Issuance) -> Self {
        Self::for_issuance(EventType::RewardRedeemed, issuance)
    }

    pub fn reward_expired(issuance: &Issuance) -> Self {
        Self::for_issuance(EventType::RewardExpired, issuance)
    }

    pub fn budget_threshold_crossed(alert: &BudgetAlert) -> Self {
        Self::new(
            EventType::BudgetThresholdCrossed,
            alert.tenant_id,
            json!({
                "budget_id": alert.budget_id,
                "budget_name": alert.budget_name,
                "alert_type": alert.alert_type,
                "severity": alert.severity,
                "currency": alert.currency,
                "balance": alert.balance,
                "soft_cap": alert.soft_cap,
                "hard_cap": alert.hard_cap,
                "utilization_percent": alert.utilization_percent,
            }),
        )
    }

    fn for_issuance(event: EventType, issuance: &Issuance) -> Self {
        Self::new(
            event,
            issuance.tenant_id,
            json!({
                "issuance_id": issuance.id,
                "customer_id": issuance.customer_id,
                "reward_id": issuance.reward_id,
                "campaign_id": issuance.campaign_id,
                "status": issuance.status,
                "code": issuance.code,
                "currency": issuance.currency,
                "face_amount": issuance.face_amount,
                "expires_at": issuance.expires_at,
                "redeemed_at": issuance.redeemed_at,
            }),
        )
    }
}
