//! Issuance service - grant, process, redeem and cancel rewards.
//!
//! Each operation is one store transaction. Ledger effects ride in the same
//! transaction as the issuance transition, so the pair is never observed
//! half-applied. Locks are taken issuance first, then budget.
//!
//! Events and alerts go out only after commit. Their failures are logged.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::budget::{LedgerError, Reservation};
use crate::domain::foundation::{
    BudgetId, CampaignId, Currency, CustomerId, IssuanceId, RewardId, TenantId, Timestamp,
};
use crate::domain::issuance::{Issuance, IssuanceError, IssuanceStatus, NewIssuance};
use crate::domain::reward::{ProcessResult, Reward, RewardError};
use crate::domain::webhook::EventEnvelope;
use crate::ports::{EventSink, RewardsStore, RewardsTx};

use super::ledger::{BudgetLedger, LedgerCommand};
use super::rewards::{HandlerRegistry, ProcessContext};

/// Command to grant a reward to a customer.
#[derive(Debug, Clone)]
pub struct GrantRewardCommand {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub campaign_id: Option<CampaignId>,
    pub reward_id: RewardId,
    pub budget_id: BudgetId,
    pub cost_amount: i64,
    pub face_amount: i64,
    pub currency: Currency,
}

/// A freshly reserved issuance and the hold placed for it.
#[derive(Debug, Clone)]
pub struct GrantOutcome {
    pub issuance: Issuance,
    pub reservation: Reservation,
}

pub struct IssuanceService {
    store: Arc<dyn RewardsStore>,
    ledger: Arc<BudgetLedger>,
    handlers: Arc<HandlerRegistry>,
    events: Option<Arc<dyn EventSink>>,
}

impl IssuanceService {
    pub fn new(
        store: Arc<dyn RewardsStore>,
        ledger: Arc<BudgetLedger>,
        handlers: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            store,
            ledger,
            handlers,
            events: None,
        }
    }

    /// Publishes lifecycle events to `events` after each commit.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn get_issuance(&self, id: &IssuanceId) -> Result<Issuance, IssuanceError> {
        self.store
            .find_issuance(id)
            .await?
            .ok_or(IssuanceError::NotFound(*id))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Grant
    // ════════════════════════════════════════════════════════════════════════

    /// Reserves budget and records a `reserved` issuance in one transaction.
    pub async fn grant_reward(
        &self,
        cmd: GrantRewardCommand,
    ) -> Result<GrantOutcome, IssuanceError> {
        let issuance = Issuance::reserve(NewIssuance {
            tenant_id: cmd.tenant_id,
            customer_id: cmd.customer_id,
            campaign_id: cmd.campaign_id,
            reward_id: cmd.reward_id,
            budget_id: cmd.budget_id,
            currency: cmd.currency,
            cost_amount: cmd.cost_amount,
            face_amount: cmd.face_amount,
        })?;
        let ledger_cmd = LedgerCommand::for_issuance(&issuance);

        let mut tx = self.store.begin().await?;
        let reward = tx
            .find_reward(&cmd.reward_id)
            .await?
            .filter(|r| r.tenant_id == cmd.tenant_id && r.active)
            .ok_or(IssuanceError::RewardNotFound(cmd.reward_id))?;

        let outcome = match self.ledger.reserve_in(tx.as_mut(), &ledger_cmd).await {
            Ok(outcome) => outcome,
            Err(e) => {
                drop(tx);
                if matches!(e, LedgerError::InsufficientFunds { .. }) {
                    self.ledger
                        .notify_rejected(&cmd.tenant_id, &cmd.budget_id)
                        .await;
                }
                return Err(e.into());
            }
        };
        tx.insert_issuance(&issuance).await?;
        tx.commit().await?;

        tracing::info!(
            issuance_id = %issuance.id,
            tenant_id = %issuance.tenant_id,
            reward_id = %reward.id,
            reward_type = %reward.kind,
            cost = issuance.cost_amount,
            "Reward granted"
        );
        self.ledger.notify_reserved(&outcome).await;

        Ok(GrantOutcome {
            issuance,
            reservation: outcome.reservation,
        })
    }

    // ════════════════════════════════════════════════════════════════════════
    // Process
    // ════════════════════════════════════════════════════════════════════════

    /// Runs the reward handler for a `reserved` issuance.
    ///
    /// A handler failure moves the issuance to `failed` and is returned as
    /// the error. The budget reservation stays in place for review.
    pub async fn process_issuance(
        &self,
        id: &IssuanceId,
        cancel: &CancellationToken,
    ) -> Result<Issuance, IssuanceError> {
        let mut tx = self.store.begin().await?;
        let mut issuance = lock_issuance(tx.as_mut(), id).await?;
        issuance.ensure_status(IssuanceStatus::Reserved)?;

        let Some(reward) = tx.find_reward(&issuance.reward_id).await? else {
            let err = IssuanceError::RewardNotFound(issuance.reward_id);
            return self.fail(tx, issuance, err).await;
        };

        let result = match self.run_handler(tx.as_mut(), cancel, &issuance, &reward).await {
            Ok(result) => result,
            Err(e) => return self.fail(tx, issuance, e.into()).await,
        };

        issuance.mark_issued(result)?;
        tx.update_issuance(&issuance).await?;
        tx.commit().await?;

        tracing::info!(
            issuance_id = %issuance.id,
            reward_type = %reward.kind,
            expires_at = ?issuance.expires_at,
            "Issuance processed"
        );
        self.publish(EventEnvelope::reward_issued(&issuance)).await;
        Ok(issuance)
    }

    async fn run_handler(
        &self,
        tx: &mut dyn RewardsTx,
        cancel: &CancellationToken,
        issuance: &Issuance,
        reward: &Reward,
    ) -> Result<ProcessResult, RewardError> {
        let reward_type = reward.reward_type()?;
        let handler = self
            .handlers
            .get(reward_type)
            .ok_or_else(|| RewardError::UnknownType(reward.kind.clone()))?;
        let mut ctx = ProcessContext { tx, cancel };
        handler.process(&mut ctx, issuance, reward).await
    }

    /// Records the failure on the issuance, commits, and hands back `err`.
    async fn fail(
        &self,
        mut tx: Box<dyn RewardsTx>,
        mut issuance: Issuance,
        err: IssuanceError,
    ) -> Result<Issuance, IssuanceError> {
        issuance.mark_failed(err.to_string())?;
        tx.update_issuance(&issuance).await?;
        tx.commit().await?;

        tracing::warn!(
            issuance_id = %issuance.id,
            code = %err.code(),
            error = %err,
            "Issuance processing failed"
        );
        Err(err)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Redeem
    // ════════════════════════════════════════════════════════════════════════

    /// Redeems an `issued` issuance and charges its reservation.
    ///
    /// A mismatching code changes nothing. A lapsed issuance is expired and
    /// released instead, and `Expired` is returned.
    pub async fn redeem_issuance(
        &self,
        id: &IssuanceId,
        presented_code: Option<&str>,
    ) -> Result<Issuance, IssuanceError> {
        let mut tx = self.store.begin().await?;
        let mut issuance = lock_issuance(tx.as_mut(), id).await?;
        issuance.ensure_status(IssuanceStatus::Issued)?;
        issuance.verify_code(presented_code)?;

        let cmd = LedgerCommand::for_issuance(&issuance);
        if issuance.is_expired_at(&Timestamp::now()) {
            issuance.mark_expired()?;
            tx.update_issuance(&issuance).await?;
            self.ledger.release_in(tx.as_mut(), &cmd).await?;
            tx.commit().await?;

            tracing::info!(issuance_id = %issuance.id, "Redemption of lapsed issuance expired it");
            self.publish(EventEnvelope::reward_expired(&issuance)).await;
            return Err(IssuanceError::Expired(issuance.id));
        }

        issuance.mark_redeemed()?;
        tx.update_issuance(&issuance).await?;
        self.ledger.charge_in(tx.as_mut(), &cmd).await?;
        tx.commit().await?;

        tracing::info!(
            issuance_id = %issuance.id,
            charged = issuance.cost_amount,
            "Issuance redeemed"
        );
        self.publish(EventEnvelope::reward_redeemed(&issuance)).await;
        Ok(issuance)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Cancel
    // ════════════════════════════════════════════════════════════════════════

    /// Cancels a `reserved` or `issued` issuance and releases its hold.
    pub async fn cancel_issuance(&self, id: &IssuanceId) -> Result<Issuance, IssuanceError> {
        let mut tx = self.store.begin().await?;
        let mut issuance = lock_issuance(tx.as_mut(), id).await?;

        issuance.cancel()?;
        tx.update_issuance(&issuance).await?;
        self.ledger
            .release_in(tx.as_mut(), &LedgerCommand::for_issuance(&issuance))
            .await?;
        tx.commit().await?;

        tracing::info!(issuance_id = %issuance.id, "Issuance cancelled");
        Ok(issuance)
    }

    async fn publish(&self, event: EventEnvelope) {
        let Some(events) = &self.events else {
            return;
        };
        let event_type = event.event;
        if let Err(e) = events.publish(event).await {
            tracing::warn!(event = %event_type, error = %e, "Failed to publish event");
        }
    }
}

async fn lock_issuance(
    tx: &mut dyn RewardsTx,
    id: &IssuanceId,
) -> Result<Issuance, IssuanceError> {
    tx.lock_issuance(id)
        .await?
        .ok_or(IssuanceError::NotFound(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::alerts::RecordingAlertSink;
    use crate::adapters::events::RecordingEventSink;
    use crate::adapters::memory::InMemoryRewardsStore;
    use crate::adapters::resilience::{CircuitBreakerRegistry, ConnectorRegistry, RetryPolicy};
    use crate::adapters::webhook::RecordingWebhookSender;
    use crate::application::ledger::CreateBudgetCommand;
    use crate::application::rewards::HandlerDefaults;
    use crate::domain::budget::{AlertThresholds, Budget, BudgetPeriod, EntryType};
    use crate::domain::foundation::ErrorCode;
    use crate::domain::reward::{RewardType, VoucherCode};
    use crate::domain::webhook::EventType;
    use crate::ports::CircuitBreakerConfig;
    use serde_json::json;

    struct Fixture {
        store: InMemoryRewardsStore,
        events: RecordingEventSink,
        ledger: Arc<BudgetLedger>,
        service: IssuanceService,
        tenant: TenantId,
    }

    fn fixture() -> Fixture {
        let store = InMemoryRewardsStore::new();
        let events = RecordingEventSink::new();
        let ledger = Arc::new(BudgetLedger::new(
            Arc::new(store.clone()),
            Arc::new(RecordingAlertSink::new()),
            AlertThresholds::default(),
        ));
        let connectors = Arc::new(ConnectorRegistry::new(Arc::new(
            CircuitBreakerRegistry::new(CircuitBreakerConfig::default()),
        )));
        let handlers = Arc::new(HandlerRegistry::standard(
            HandlerDefaults::default(),
            connectors,
            Arc::new(RecordingWebhookSender::new()),
            RetryPolicy::default(),
        ));
        let service = IssuanceService::new(Arc::new(store.clone()), ledger.clone(), handlers)
            .with_events(Arc::new(events.clone()));
        Fixture {
            store,
            events,
            ledger,
            service,
            tenant: TenantId::new(),
        }
    }

    async fn budget(f: &Fixture) -> Budget {
        f.ledger
            .create_budget(CreateBudgetCommand {
                tenant_id: f.tenant,
                name: "Promo".to_string(),
                currency: Currency::Usd,
                soft_cap: 8_000,
                hard_cap: 10_000,
                period: BudgetPeriod::Rolling,
            })
            .await
            .unwrap()
    }

    async fn catalog(f: &Fixture, reward_type: RewardType, config: serde_json::Value) -> Reward {
        let reward = Reward::new(f.tenant, "reward", reward_type, config);
        f.store.save_reward(&reward).await.unwrap();
        reward
    }

    fn grant(f: &Fixture, budget: &Budget, reward: &Reward, cost: i64) -> GrantRewardCommand {
        GrantRewardCommand {
            tenant_id: f.tenant,
            customer_id: CustomerId::new(),
            campaign_id: None,
            reward_id: reward.id,
            budget_id: budget.id,
            cost_amount: cost,
            face_amount: cost * 2,
            currency: Currency::Usd,
        }
    }

    async fn balance(f: &Fixture, budget: &Budget) -> i64 {
        f.ledger.get_budget(&f.tenant, &budget.id).await.unwrap().balance
    }

    fn discount() -> serde_json::Value {
        json!({"discount_type": "percentage", "amount": 10})
    }

    async fn issued(f: &Fixture) -> (Budget, Issuance) {
        let b = budget(f).await;
        let reward = catalog(f, RewardType::Discount, discount()).await;
        let granted = f.service.grant_reward(grant(f, &b, &reward, 1_000)).await.unwrap();
        let issuance = f
            .service
            .process_issuance(&granted.issuance.id, &CancellationToken::new())
            .await
            .unwrap();
        (b, issuance)
    }

    #[tokio::test]
    async fn grant_reserves_budget_and_records_issuance() {
        let f = fixture();
        let b = budget(&f).await;
        let reward = catalog(&f, RewardType::Points, json!({"points": 100})).await;

        let outcome = f.service.grant_reward(grant(&f, &b, &reward, 1_000)).await.unwrap();

        assert_eq!(outcome.issuance.status, IssuanceStatus::Reserved);
        assert_eq!(outcome.reservation.new_balance, 1_000);
        assert_eq!(balance(&f, &b).await, 1_000);
        let stored = f.service.get_issuance(&outcome.issuance.id).await.unwrap();
        assert_eq!(stored, outcome.issuance);
    }

    #[tokio::test]
    async fn grant_over_hard_cap_leaves_nothing_behind() {
        let f = fixture();
        let b = budget(&f).await;
        let reward = catalog(&f, RewardType::Points, json!({"points": 100})).await;

        let err = f
            .service
            .grant_reward(grant(&f, &b, &reward, 10_001))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InsufficientFunds);
        assert_eq!(balance(&f, &b).await, 0);
        assert!(f.store.all_ledger_entries(&b.id).await.is_empty());
    }

    #[tokio::test]
    async fn grant_for_foreign_reward_is_rejected() {
        let f = fixture();
        let b = budget(&f).await;
        let foreign = Reward::new(TenantId::new(), "x", RewardType::Points, json!({"points": 1}));
        f.store.save_reward(&foreign).await.unwrap();

        let err = f
            .service
            .grant_reward(grant(&f, &b, &foreign, 100))
            .await
            .unwrap_err();

        assert_eq!(err, IssuanceError::RewardNotFound(foreign.id));
        assert_eq!(balance(&f, &b).await, 0);
    }

    #[tokio::test]
    async fn process_issues_reward_and_emits_event() {
        let f = fixture();
        let (_, issuance) = issued(&f).await;

        assert_eq!(issuance.status, IssuanceStatus::Issued);
        assert_eq!(issuance.code.as_ref().map(|c| c.len()), Some(8));
        assert!(issuance.expires_at.is_some());
        assert_eq!(f.events.events_of_type(EventType::RewardIssued).len(), 1);
    }

    #[tokio::test]
    async fn process_twice_is_rejected() {
        let f = fixture();
        let (_, issuance) = issued(&f).await;

        let err = f
            .service
            .process_issuance(&issuance.id, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, IssuanceError::WrongStatus { .. }));
    }

    #[tokio::test]
    async fn empty_pool_fails_issuance_and_keeps_reservation() {
        let f = fixture();
        let b = budget(&f).await;
        let reward = catalog(&f, RewardType::PooledCode, json!({})).await;
        let granted = f.service.grant_reward(grant(&f, &b, &reward, 500)).await.unwrap();

        let err = f
            .service
            .process_issuance(&granted.issuance.id, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::NoInventory);
        let stored = f.service.get_issuance(&granted.issuance.id).await.unwrap();
        assert_eq!(stored.status, IssuanceStatus::Failed);
        assert!(stored.failure_reason.is_some());
        assert_eq!(balance(&f, &b).await, 500);
    }

    #[tokio::test]
    async fn pooled_code_is_claimed_for_issuance() {
        let f = fixture();
        let b = budget(&f).await;
        let reward = catalog(&f, RewardType::PooledCode, json!({})).await;
        f.store
            .insert_voucher_codes(&[VoucherCode::available(f.tenant, reward.id, "POOL-1")])
            .await
            .unwrap();
        let granted = f.service.grant_reward(grant(&f, &b, &reward, 500)).await.unwrap();

        let issuance = f
            .service
            .process_issuance(&granted.issuance.id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(issuance.code.as_deref(), Some("POOL-1"));
        assert_eq!(f.store.count_available_codes(&reward.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_reward_type_fails_issuance() {
        let f = fixture();
        let b = budget(&f).await;
        let mut reward = Reward::new(f.tenant, "airtime", RewardType::Points, json!({}));
        reward.kind = "airtime".to_string();
        f.store.save_reward(&reward).await.unwrap();
        let granted = f.service.grant_reward(grant(&f, &b, &reward, 100)).await.unwrap();

        let err = f
            .service
            .process_issuance(&granted.issuance.id, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::UnknownRewardType);
        let stored = f.service.get_issuance(&granted.issuance.id).await.unwrap();
        assert_eq!(stored.status, IssuanceStatus::Failed);
    }

    #[tokio::test]
    async fn redeem_charges_reservation() {
        let f = fixture();
        let (b, issuance) = issued(&f).await;

        let redeemed = f
            .service
            .redeem_issuance(&issuance.id, issuance.code.as_deref())
            .await
            .unwrap();

        assert_eq!(redeemed.status, IssuanceStatus::Redeemed);
        assert!(redeemed.redeemed_at.is_some());
        let entries = f.store.all_ledger_entries(&b.id).await;
        assert_eq!(
            entries.iter().map(|e| e.entry_type).collect::<Vec<_>>(),
            vec![EntryType::Reserve, EntryType::Charge]
        );
        assert_eq!(balance(&f, &b).await, 1_000);
        assert_eq!(f.events.events_of_type(EventType::RewardRedeemed).len(), 1);
    }

    #[tokio::test]
    async fn wrong_code_changes_nothing() {
        let f = fixture();
        let (b, issuance) = issued(&f).await;

        let err = f
            .service
            .redeem_issuance(&issuance.id, Some("NOPE"))
            .await
            .unwrap_err();

        assert_eq!(err, IssuanceError::InvalidCode);
        let stored = f.service.get_issuance(&issuance.id).await.unwrap();
        assert_eq!(stored.status, IssuanceStatus::Issued);
        assert_eq!(f.store.all_ledger_entries(&b.id).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_charge_rolls_redemption_back() {
        let f = fixture();
        let (b, issuance) = issued(&f).await;
        // Hold released behind the issuance's back, so the charge has nothing to finalize.
        f.ledger
            .release(LedgerCommand::for_issuance(&issuance))
            .await
            .unwrap();
        let balance_before = balance(&f, &b).await;

        let err = f
            .service
            .redeem_issuance(&issuance.id, issuance.code.as_deref())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IssuanceError::Ledger(LedgerError::NoReservation { .. })
        ));
        let stored = f.service.get_issuance(&issuance.id).await.unwrap();
        assert_eq!(stored.status, IssuanceStatus::Issued);
        assert!(stored.redeemed_at.is_none());
        assert_eq!(balance(&f, &b).await, balance_before);
        let entries = f.store.all_ledger_entries(&b.id).await;
        assert_eq!(
            entries.iter().map(|e| e.entry_type).collect::<Vec<_>>(),
            vec![EntryType::Reserve, EntryType::Release]
        );
        assert!(f.events.events_of_type(EventType::RewardRedeemed).is_empty());
    }

    #[tokio::test]
    async fn second_redemption_is_rejected() {
        let f = fixture();
        let (_, issuance) = issued(&f).await;
        f.service.redeem_issuance(&issuance.id, None).await.unwrap();

        let err = f.service.redeem_issuance(&issuance.id, None).await.unwrap_err();

        assert!(matches!(
            err,
            IssuanceError::WrongStatus {
                actual: IssuanceStatus::Redeemed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cancel_releases_reservation() {
        let f = fixture();
        let (b, issuance) = issued(&f).await;

        let cancelled = f.service.cancel_issuance(&issuance.id).await.unwrap();

        assert_eq!(cancelled.status, IssuanceStatus::Cancelled);
        assert_eq!(balance(&f, &b).await, 0);
    }

    #[tokio::test]
    async fn cancel_of_redeemed_issuance_is_rejected() {
        let f = fixture();
        let (b, issuance) = issued(&f).await;
        f.service.redeem_issuance(&issuance.id, None).await.unwrap();

        let err = f.service.cancel_issuance(&issuance.id).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        assert_eq!(balance(&f, &b).await, 1_000);
    }

    #[tokio::test]
    async fn missing_issuance_is_not_found() {
        let f = fixture();
        let id = IssuanceId::new();
        assert_eq!(
            f.service.cancel_issuance(&id).await.unwrap_err(),
            IssuanceError::NotFound(id)
        );
    }
}
