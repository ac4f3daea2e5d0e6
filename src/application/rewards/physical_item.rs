//! Physical items collected in store with a numeric claim token.

use async_trait::async_trait;
use serde_json::json;

use crate::domain::issuance::Issuance;
use crate::domain::reward::codes::claim_token;
use crate::domain::reward::{
    expiry_after, window_days, PhysicalItemConfig, ProcessResult, Reward, RewardError, RewardType,
};

use super::{ProcessContext, RewardHandler};

pub struct PhysicalItemHandler {
    token_length: usize,
    default_collection_days: i64,
}

impl PhysicalItemHandler {
    pub fn new(token_length: usize, default_collection_days: i64) -> Self {
        Self {
            token_length,
            default_collection_days,
        }
    }
}

#[async_trait]
impl RewardHandler for PhysicalItemHandler {
    fn reward_type(&self) -> RewardType {
        RewardType::PhysicalItem
    }

    async fn process(
        &self,
        _ctx: &mut ProcessContext<'_>,
        _issuance: &Issuance,
        reward: &Reward,
    ) -> Result<ProcessResult, RewardError> {
        let config: PhysicalItemConfig = reward.parse_config()?;
        if config.item_name.trim().is_empty() {
            return Err(RewardError::invalid_config(reward.id, "item_name is required"));
        }

        let days = window_days(
            reward.id,
            "collection_days",
            config.collection_days,
            self.default_collection_days,
        )?;
        Ok(ProcessResult {
            code: Some(claim_token(self.token_length)),
            external_ref: None,
            expires_at: Some(expiry_after(reward.id, "collection_days", days)?),
            metadata: json!({
                "item_name": config.item_name,
                "pickup_location": config.pickup_location,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRewardsStore;
    use crate::domain::foundation::Timestamp;
    use crate::application::rewards::test_support::{issuance_for, reward, run};

    #[tokio::test]
    async fn issues_numeric_token_with_collection_window() {
        let store = InMemoryRewardsStore::new();
        let reward = reward(
            RewardType::PhysicalItem,
            json!({"item_name": "Tote bag", "pickup_location": "Westlands"}),
        );

        let result = run(&PhysicalItemHandler::new(6, 30), &store, &issuance_for(&reward), &reward)
            .await
            .unwrap();

        let token = result.code.unwrap();
        assert_eq!(token.len(), 6);
        assert!(token.chars().all(|c| c.is_ascii_digit()));
        assert!(result
            .expires_at
            .unwrap()
            .is_after(&Timestamp::now().add_days(29).unwrap()));
        assert_eq!(result.metadata["pickup_location"], "Westlands");
    }

    #[tokio::test]
    async fn rejects_collection_window_out_of_range() {
        let store = InMemoryRewardsStore::new();
        for collection_days in [-1, 1_000_000_000] {
            let reward = reward(
                RewardType::PhysicalItem,
                json!({"item_name": "Mug", "collection_days": collection_days}),
            );

            let err = run(&PhysicalItemHandler::new(6, 30), &store, &issuance_for(&reward), &reward)
                .await
                .unwrap_err();
            assert_eq!(err.code(), crate::domain::foundation::ErrorCode::InvalidRewardConfig);
        }
    }
}
