//! Discount codes drawn from a confusable-free alphabet.

use async_trait::async_trait;
use serde_json::json;

use crate::domain::issuance::Issuance;
use crate::domain::reward::codes::discount_code;
use crate::domain::reward::{
    expiry_after, window_days, DiscountConfig, DiscountKind, ProcessResult, Reward, RewardError,
    RewardType,
};

use super::{ProcessContext, RewardHandler};

pub struct DiscountHandler {
    code_length: usize,
    default_valid_days: i64,
}

impl DiscountHandler {
    pub fn new(code_length: usize, default_valid_days: i64) -> Self {
        Self {
            code_length,
            default_valid_days,
        }
    }
}

#[async_trait]
impl RewardHandler for DiscountHandler {
    fn reward_type(&self) -> RewardType {
        RewardType::Discount
    }

    async fn process(
        &self,
        _ctx: &mut ProcessContext<'_>,
        _issuance: &Issuance,
        reward: &Reward,
    ) -> Result<ProcessResult, RewardError> {
        let config: DiscountConfig = reward.parse_config()?;
        if config.amount <= 0 {
            return Err(RewardError::invalid_config(reward.id, "amount must be positive"));
        }
        if config.discount_type == DiscountKind::Percentage && config.amount > 100 {
            return Err(RewardError::invalid_config(
                reward.id,
                "percentage discount cannot exceed 100",
            ));
        }

        let valid_days =
            window_days(reward.id, "valid_days", config.valid_days, self.default_valid_days)?;
        Ok(ProcessResult {
            code: Some(discount_code(self.code_length)),
            external_ref: None,
            expires_at: Some(expiry_after(reward.id, "valid_days", valid_days)?),
            metadata: json!({
                "discount_type": config.discount_type,
                "amount": config.amount,
                "min_basket": config.min_basket,
            }),
        })
    }
}
