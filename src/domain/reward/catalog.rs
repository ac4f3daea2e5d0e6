//! Reward catalog entries and their per-type configuration.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{RewardId, TenantId, Timestamp};

use super::RewardError;

/// Strategy used to deliver a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Discount,
    PooledCode,
    ExternalVoucher,
    Points,
    PhysicalItem,
    WebhookCustom,
}

impl RewardType {
    pub const ALL: [RewardType; 6] = [
        RewardType::Discount,
        RewardType::PooledCode,
        RewardType::ExternalVoucher,
        RewardType::Points,
        RewardType::PhysicalItem,
        RewardType::WebhookCustom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Discount => "discount",
            RewardType::PooledCode => "pooled_code",
            RewardType::ExternalVoucher => "external_voucher",
            RewardType::Points => "points",
            RewardType::PhysicalItem => "physical_item",
            RewardType::WebhookCustom => "webhook_custom",
        }
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewardType {
    type Err = RewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RewardType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RewardError::UnknownType(s.to_string()))
    }
}

/// A reward catalog entry.
///
/// `kind` is stored as free text so that rows written by other tools with an
/// unsupported type still load; [`Reward::reward_type`] is the only place it
/// is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub tenant_id: TenantId,
    pub name: String,
    pub kind: String,
    pub config: serde_json::Value,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Reward {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        reward_type: RewardType,
        config: serde_json::Value,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: RewardId::new(),
            tenant_id,
            name: name.into(),
            kind: reward_type.as_str().to_string(),
            config,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn reward_type(&self) -> Result<RewardType, RewardError> {
        self.kind.parse()
    }

    /// Deserializes `config` into the handler-specific shape.
    pub fn parse_config<T: DeserializeOwned>(&self) -> Result<T, RewardError> {
        serde_json::from_value(self.config.clone())
            .map_err(|e| RewardError::invalid_config(self.id, e.to_string()))
    }
}

/// Longest validity or collection window a catalog entry may configure.
pub const MAX_WINDOW_DAYS: i64 = 3_650;

/// Resolves a day window from `configured`, falling back to `default`.
///
/// The window must lie in `1..=MAX_WINDOW_DAYS`.
pub fn window_days(
    reward_id: RewardId,
    field: &str,
    configured: Option<i64>,
    default: i64,
) -> Result<i64, RewardError> {
    let days = configured.unwrap_or(default);
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(RewardError::invalid_config(
            reward_id,
            format!("{field} must be between 1 and {MAX_WINDOW_DAYS}, got {days}"),
        ));
    }
    Ok(days)
}

/// Expiry `days` from now for the window named `field`.
pub fn expiry_after(reward_id: RewardId, field: &str, days: i64) -> Result<Timestamp, RewardError> {
    Timestamp::now()
        .add_days(days)
        .ok_or_else(|| RewardError::invalid_config(reward_id, format!("{field} out of range")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountConfig {
    pub discount_type: DiscountKind,
    pub amount: i64,
    #[serde(default)]
    pub min_basket: Option<i64>,
    #[serde(default)]
    pub valid_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalVoucherConfig {
    /// Name the connector was registered under.
    pub supplier: String,
    pub product_id: String,
    #[serde(default)]
    pub valid_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsConfig {
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalItemConfig {
    pub item_name: String,
    #[serde(default)]
    pub pickup_location: Option<String>,
    #[serde(default)]
    pub collection_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookCustomConfig {
    pub url: String,
    pub secret: String,
    /// Extra fields merged into the signed payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reward_type_parses_every_rendering() {
        for t in RewardType::ALL {
            assert_eq!(t.as_str().parse::<RewardType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_kind_is_reported() {
        let mut reward = Reward::new(TenantId::new(), "mystery", RewardType::Points, json!({}));
        reward.kind = "airtime".to_string();
        assert_eq!(
            reward.reward_type(),
            Err(RewardError::UnknownType("airtime".to_string()))
        );
    }

    #[test]
    fn parse_config_reads_optional_fields() {
        let reward = Reward::new(
            TenantId::new(),
            "10% off",
            RewardType::Discount,
            json!({"discount_type": "percentage", "amount": 10}),
        );
        let config: DiscountConfig = reward.parse_config().unwrap();
        assert_eq!(config.discount_type, DiscountKind::Percentage);
        assert_eq!(config.valid_days, None);
    }

    #[test]
    fn window_days_falls_back_and_enforces_bounds() {
        let id = RewardId::new();
        assert_eq!(window_days(id, "valid_days", None, 30), Ok(30));
        assert_eq!(window_days(id, "valid_days", Some(MAX_WINDOW_DAYS), 30), Ok(MAX_WINDOW_DAYS));
        for bad in [0, -5, MAX_WINDOW_DAYS + 1, 1_000_000_000] {
            let err = window_days(id, "valid_days", Some(bad), 30).unwrap_err();
            assert!(matches!(err, RewardError::InvalidConfig { reward_id, .. } if reward_id == id));
        }
    }

    #[test]
    fn parse_config_failure_names_the_reward() {
        let reward = Reward::new(TenantId::new(), "pts", RewardType::Points, json!({}));
        let err = reward.parse_config::<PointsConfig>().unwrap_err();
        assert!(matches!(err, RewardError::InvalidConfig { reward_id, .. } if reward_id == reward.id));
    }
}
