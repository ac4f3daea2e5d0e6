//! Reward handlers - one strategy per reward type.
//!
//! The issuance service looks a handler up by [`RewardType`] and hands it the
//! open transaction, so handlers that touch storage (the voucher pool) take
//! part in the same unit of work as the issuance transition.
//!
//! | Type              | Handler                     | I/O                         |
//! |-------------------|-----------------------------|-----------------------------|
//! | `discount`        | [`DiscountHandler`]         | none                        |
//! | `pooled_code`     | [`PooledCodeHandler`]       | claims one pool row         |
//! | `external_voucher`| [`ExternalVoucherHandler`]  | supplier, retry, breaker    |
//! | `points`          | [`PointsHandler`]           | none                        |
//! | `physical_item`   | [`PhysicalItemHandler`]     | none                        |
//! | `webhook_custom`  | [`WebhookCustomHandler`]    | signed POST, retry, breaker |

mod discount;
mod external_voucher;
mod physical_item;
mod points;
mod pooled_code;
mod webhook_custom;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::adapters::resilience::{ConnectorRegistry, RetryPolicy};
use crate::domain::issuance::Issuance;
use crate::domain::reward::{ProcessResult, Reward, RewardError, RewardType};
use crate::ports::{RewardsTx, WebhookSender};

pub use discount::DiscountHandler;
pub use external_voucher::ExternalVoucherHandler;
pub use physical_item::PhysicalItemHandler;
pub use points::PointsHandler;
pub use pooled_code::PooledCodeHandler;
pub use webhook_custom::WebhookCustomHandler;

/// What a handler may use while processing.
pub struct ProcessContext<'a> {
    /// The issuance's open transaction.
    pub tx: &'a mut dyn RewardsTx,
    /// Fires when the caller gives up; long waits must stop.
    pub cancel: &'a CancellationToken,
}

/// Turns a reserved issuance into a concrete reward artifact.
#[async_trait]
pub trait RewardHandler: Send + Sync {
    fn reward_type(&self) -> RewardType;

    async fn process(
        &self,
        ctx: &mut ProcessContext<'_>,
        issuance: &Issuance,
        reward: &Reward,
    ) -> Result<ProcessResult, RewardError>;
}

/// Fallbacks used when a catalog entry leaves a field unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerDefaults {
    pub discount_valid_days: i64,
    pub physical_collection_days: i64,
    pub discount_code_length: usize,
    pub claim_token_length: usize,
}

impl Default for HandlerDefaults {
    fn default() -> Self {
        Self {
            discount_valid_days: 30,
            physical_collection_days: 30,
            discount_code_length: 8,
            claim_token_length: 6,
        }
    }
}

/// Type-keyed handler lookup, built once at startup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<RewardType, Arc<dyn RewardHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a handler for every reward type.
    pub fn standard(
        defaults: HandlerDefaults,
        connectors: Arc<ConnectorRegistry>,
        webhooks: Arc<dyn WebhookSender>,
        retry: RetryPolicy,
    ) -> Self {
        let breakers = connectors.breakers().clone();
        Self::new()
            .with(Arc::new(DiscountHandler::new(
                defaults.discount_code_length,
                defaults.discount_valid_days,
            )))
            .with(Arc::new(PooledCodeHandler))
            .with(Arc::new(ExternalVoucherHandler::new(
                connectors,
                retry.clone(),
            )))
            .with(Arc::new(PointsHandler))
            .with(Arc::new(PhysicalItemHandler::new(
                defaults.claim_token_length,
                defaults.physical_collection_days,
            )))
            .with(Arc::new(WebhookCustomHandler::new(webhooks, breakers, retry)))
    }

    /// Adds or replaces the handler for its type.
    pub fn with(mut self, handler: Arc<dyn RewardHandler>) -> Self {
        self.handlers.insert(handler.reward_type(), handler);
        self
    }

    pub fn get(&self, reward_type: RewardType) -> Option<Arc<dyn RewardHandler>> {
        self.handlers.get(&reward_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::adapters::memory::InMemoryRewardsStore;
    use crate::domain::foundation::{BudgetId, Currency, CustomerId, TenantId};
    use crate::domain::issuance::NewIssuance;
    use crate::ports::RewardsStore;

    pub fn issuance_for(reward: &Reward) -> Issuance {
        Issuance::reserve(NewIssuance {
            tenant_id: reward.tenant_id,
            customer_id: CustomerId::new(),
            campaign_id: None,
            reward_id: reward.id,
            budget_id: BudgetId::new(),
            currency: Currency::Usd,
            cost_amount: 500,
            face_amount: 1_000,
        })
        .unwrap()
    }

    pub fn reward(reward_type: RewardType, config: serde_json::Value) -> Reward {
        Reward::new(TenantId::new(), "test reward", reward_type, config)
    }

    /// Runs `handler` against a fresh in-memory transaction.
    pub async fn run(
        handler: &dyn RewardHandler,
        store: &InMemoryRewardsStore,
        issuance: &Issuance,
        reward: &Reward,
    ) -> Result<ProcessResult, RewardError> {
        let cancel = CancellationToken::new();
        let mut tx = store.begin().await.unwrap();
        let result = {
            let mut ctx = ProcessContext {
                tx: tx.as_mut(),
                cancel: &cancel,
            };
            handler.process(&mut ctx, issuance, reward).await
        };
        tx.commit().await.unwrap();
        result
    }
}
