//! Loyalty points credit. Pure validation, no I/O.

use async_trait::async_trait;
use serde_json::json;

use crate::domain::issuance::Issuance;
use crate::domain::reward::{PointsConfig, ProcessResult, Reward, RewardError, RewardType};

use super::{ProcessContext, RewardHandler};

pub struct PointsHandler;

#[async_trait]
impl RewardHandler for PointsHandler {
    fn reward_type(&self) -> RewardType {
        RewardType::Points
    }

    async fn process(
        &self,
        _ctx: &mut ProcessContext<'_>,
        issuance: &Issuance,
        reward: &Reward,
    ) -> Result<ProcessResult, RewardError> {
        let config: PointsConfig = reward.parse_config()?;
        if config.points <= 0 {
            return Err(RewardError::invalid_config(reward.id, "points must be positive"));
        }

        Ok(ProcessResult {
            code: None,
            external_ref: None,
            expires_at: None,
            metadata: json!({
                "points": config.points,
                "customer_id": issuance.customer_id,
                "description": format!("{} points credited", config.points),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRewardsStore;
    use crate::application::rewards::test_support::{issuance_for, reward, run};

    #[tokio::test]
    async fn credits_points_without_code() {
        let store = InMemoryRewardsStore::new();
        let reward = reward(RewardType::Points, json!({"points": 250}));

        let result = run(&PointsHandler, &store, &issuance_for(&reward), &reward)
            .await
            .unwrap();

        assert!(result.code.is_none());
        assert_eq!(result.metadata["points"], 250);
    }

    #[tokio::test]
    async fn zero_points_is_invalid() {
        let store = InMemoryRewardsStore::new();
        let reward = reward(RewardType::Points, json!({"points": 0}));

        let err = run(&PointsHandler, &store, &issuance_for(&reward), &reward)
            .await
            .unwrap_err();
        assert!(matches!(err, RewardError::InvalidConfig { .. }));
    }
}
