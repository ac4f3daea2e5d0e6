//! Pre-loaded code pools. Each issuance claims exactly one unused code.

use async_trait::async_trait;
use serde_json::json;

use crate::domain::issuance::Issuance;
use crate::domain::reward::{ProcessResult, Reward, RewardError, RewardType};

use super::{ProcessContext, RewardHandler};

pub struct PooledCodeHandler;

#[async_trait]
impl RewardHandler for PooledCodeHandler {
    fn reward_type(&self) -> RewardType {
        RewardType::PooledCode
    }

    async fn process(
        &self,
        ctx: &mut ProcessContext<'_>,
        issuance: &Issuance,
        reward: &Reward,
    ) -> Result<ProcessResult, RewardError> {
        let claimed = ctx
            .tx
            .claim_voucher_code(&reward.id, &issuance.id)
            .await?
            .ok_or(RewardError::NoInventory(reward.id))?;

        tracing::debug!(
            issuance_id = %issuance.id,
            reward_id = %reward.id,
            voucher_code_id = %claimed.id,
            "Claimed pooled voucher code"
        );

        Ok(ProcessResult {
            code: Some(claimed.code),
            external_ref: Some(claimed.id.to_string()),
            expires_at: None,
            metadata: json!({ "voucher_code_id": claimed.id }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRewardsStore;
    use crate::application::rewards::test_support::{issuance_for, reward, run};
    use crate::domain::reward::VoucherCode;
    use crate::ports::RewardsStore;

    #[tokio::test]
    async fn claims_distinct_codes_until_exhausted() {
        let store = InMemoryRewardsStore::new();
        let reward = reward(RewardType::PooledCode, json!({}));
        store.save_reward(&reward).await.unwrap();
        store
            .insert_voucher_codes(&[
                VoucherCode::available(reward.tenant_id, reward.id, "POOL-1"),
                VoucherCode::available(reward.tenant_id, reward.id, "POOL-2"),
            ])
            .await
            .unwrap();

        let first = run(&PooledCodeHandler, &store, &issuance_for(&reward), &reward)
            .await
            .unwrap();
        let second = run(&PooledCodeHandler, &store, &issuance_for(&reward), &reward)
            .await
            .unwrap();
        assert_ne!(first.code, second.code);
        assert_eq!(store.count_available_codes(&reward.id).await.unwrap(), 0);

        let err = run(&PooledCodeHandler, &store, &issuance_for(&reward), &reward)
            .await
            .unwrap_err();
        assert_eq!(err, RewardError::NoInventory(reward.id));
    }
}
