//! Expiry sweeper - expires lapsed issuances and releases their holds.
//!
//! Each issuance is handled in its own transaction. Rows another sweeper
//! instance is already working on are skipped, and a failing row is logged
//! and counted without stopping the batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ledger::{BudgetLedger, LedgerCommand};
use crate::domain::foundation::{IssuanceId, Timestamp};
use crate::domain::issuance::{Issuance, IssuanceError};
use crate::domain::webhook::EventEnvelope;
use crate::ports::{EventSink, RewardsStore};

use super::BackgroundTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperSettings {
    pub interval: Duration,
    /// Issuances examined per run.
    pub batch_limit: u32,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_limit: 500,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub scanned: usize,
    pub expired: usize,
    pub failed: usize,
    /// Rows claimed by another runner or no longer eligible.
    pub skipped: usize,
}

pub struct ExpirySweeper {
    store: Arc<dyn RewardsStore>,
    ledger: Arc<BudgetLedger>,
    events: Option<Arc<dyn EventSink>>,
    settings: SweeperSettings,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn RewardsStore>,
        ledger: Arc<BudgetLedger>,
        settings: SweeperSettings,
    ) -> Self {
        Self {
            store,
            ledger,
            events: None,
            settings,
        }
    }

    /// Publishes `reward.expired` for every issuance the sweeper expires.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// One pass over the issuances lapsed at this moment.
    pub async fn run_once(&self) -> SweepStats {
        let now = Timestamp::now();
        let mut stats = SweepStats::default();

        let ids = match self
            .store
            .find_expired_issuance_ids(&now, self.settings.batch_limit)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Expiry sweep could not list lapsed issuances");
                return stats;
            }
        };
        stats.scanned = ids.len();

        for id in ids {
            match self.expire_one(&id, &now).await {
                Ok(Some(issuance)) => {
                    stats.expired += 1;
                    self.publish(&issuance).await;
                }
                Ok(None) => stats.skipped += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(
                        issuance_id = %id,
                        code = %e.code(),
                        error = %e,
                        "Failed to expire issuance"
                    );
                }
            }
        }

        if stats.scanned > 0 {
            tracing::info!(
                scanned = stats.scanned,
                expired = stats.expired,
                skipped = stats.skipped,
                failed = stats.failed,
                "Expiry sweep finished"
            );
        }
        stats
    }

    async fn expire_one(
        &self,
        id: &IssuanceId,
        now: &Timestamp,
    ) -> Result<Option<Issuance>, IssuanceError> {
        let mut tx = self.store.begin().await?;
        let Some(mut issuance) = tx.claim_expired_issuance(id, now).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        issuance.mark_expired()?;
        tx.update_issuance(&issuance).await?;
        self.ledger
            .release_in(tx.as_mut(), &LedgerCommand::for_issuance(&issuance))
            .await?;
        tx.commit().await?;

        tracing::debug!(
            issuance_id = %issuance.id,
            released = issuance.cost_amount,
            "Issuance expired"
        );
        Ok(Some(issuance))
    }

    async fn publish(&self, issuance: &Issuance) {
        if let Some(events) = &self.events {
            if let Err(e) = events.publish(EventEnvelope::reward_expired(issuance)).await {
                tracing::warn!(issuance_id = %issuance.id, error = %e, "Failed to publish expiry");
            }
        }
    }
}

#[async_trait]
impl BackgroundTask for ExpirySweeper {
    fn name(&self) -> &'static str {
        "expiry_sweeper"
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.run_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::alerts::RecordingAlertSink;
    use crate::adapters::events::RecordingEventSink;
    use crate::adapters::memory::InMemoryRewardsStore;
    use crate::application::ledger::CreateBudgetCommand;
    use crate::domain::budget::{AlertThresholds, Budget, BudgetPeriod};
    use crate::domain::foundation::{Currency, CustomerId, RewardId, TenantId};
    use crate::domain::issuance::{IssuanceStatus, NewIssuance};
    use crate::domain::reward::ProcessResult;
    use crate::domain::webhook::EventType;

    struct Fixture {
        store: InMemoryRewardsStore,
        ledger: Arc<BudgetLedger>,
        events: RecordingEventSink,
        sweeper: ExpirySweeper,
        budget: Budget,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryRewardsStore::new();
        let ledger = Arc::new(BudgetLedger::new(
            Arc::new(store.clone()),
            Arc::new(RecordingAlertSink::new()),
            AlertThresholds::default(),
        ));
        let budget = ledger
            .create_budget(CreateBudgetCommand {
                tenant_id: TenantId::new(),
                name: "Promo".into(),
                currency: Currency::Usd,
                soft_cap: 8_000,
                hard_cap: 10_000,
                period: BudgetPeriod::Rolling,
            })
            .await
            .unwrap();
        let events = RecordingEventSink::new();
        let sweeper = ExpirySweeper::new(
            Arc::new(store.clone()),
            ledger.clone(),
            SweeperSettings::default(),
        )
        .with_events(Arc::new(events.clone()));
        Fixture {
            store,
            ledger,
            events,
            sweeper,
            budget,
        }
    }

    /// Stores an issued issuance with its reservation, expiring `days` from now.
    async fn issued(f: &Fixture, days: i64) -> Issuance {
        let mut issuance = Issuance::reserve(NewIssuance {
            tenant_id: f.budget.tenant_id,
            customer_id: CustomerId::new(),
            campaign_id: None,
            reward_id: RewardId::new(),
            budget_id: f.budget.id,
            currency: Currency::Usd,
            cost_amount: 1_000,
            face_amount: 1_000,
        })
        .unwrap();
        let mut tx = f.store.begin().await.unwrap();
        f.ledger
            .reserve_in(tx.as_mut(), &LedgerCommand::for_issuance(&issuance))
            .await
            .unwrap();
        issuance
            .mark_issued(ProcessResult {
                code: Some("CODE".into()),
                expires_at: Some(Timestamp::now().add_days(days).unwrap()),
                ..ProcessResult::default()
            })
            .unwrap();
        tx.insert_issuance(&issuance).await.unwrap();
        tx.commit().await.unwrap();
        issuance
    }

    async fn balance(f: &Fixture) -> i64 {
        f.ledger
            .get_budget(&f.budget.tenant_id, &f.budget.id)
            .await
            .unwrap()
            .balance
    }

    #[tokio::test]
    async fn expires_lapsed_issuances_and_releases_holds() {
        let f = fixture().await;
        let lapsed = issued(&f, -1).await;
        let live = issued(&f, 5).await;
        assert_eq!(balance(&f).await, 2_000);

        let stats = f.sweeper.run_once().await;

        assert_eq!(
            stats,
            SweepStats {
                scanned: 1,
                expired: 1,
                failed: 0,
                skipped: 0
            }
        );
        let expired = f.store.find_issuance(&lapsed.id).await.unwrap().unwrap();
        assert_eq!(expired.status, IssuanceStatus::Expired);
        let untouched = f.store.find_issuance(&live.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, IssuanceStatus::Issued);
        assert_eq!(balance(&f).await, 1_000);
        assert_eq!(f.events.events_of_type(EventType::RewardExpired).len(), 1);
    }

    #[tokio::test]
    async fn second_sweep_finds_nothing() {
        let f = fixture().await;
        issued(&f, -1).await;

        f.sweeper.run_once().await;
        let stats = f.sweeper.run_once().await;

        assert_eq!(stats, SweepStats::default());
    }

    #[tokio::test]
    async fn row_failure_does_not_abort_batch() {
        let f = fixture().await;
        let broken = issued(&f, -2).await;
        let healthy = issued(&f, -1).await;

        // Release the broken one's hold out of band so the sweep's release fails.
        f.ledger
            .release(LedgerCommand::for_issuance(&broken))
            .await
            .unwrap();

        let stats = f.sweeper.run_once().await;

        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.expired, 1);
        let broken = f.store.find_issuance(&broken.id).await.unwrap().unwrap();
        assert_eq!(broken.status, IssuanceStatus::Issued);
        let healthy = f.store.find_issuance(&healthy.id).await.unwrap().unwrap();
        assert_eq!(healthy.status, IssuanceStatus::Expired);
        assert_eq!(balance(&f).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_sweeps_immediately_and_stops_on_cancel() {
        let f = fixture().await;
        let lapsed = issued(&f, -1).await;
        let store = f.store.clone();
        let sweeper = Arc::new(f.sweeper);
        let cancel = CancellationToken::new();

        let handle = crate::application::background::spawn(sweeper, cancel.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let swept = store.find_issuance(&lapsed.id).await.unwrap().unwrap();
        assert_eq!(swept.status, IssuanceStatus::Expired);

        cancel.cancel();
        handle.await.unwrap();
    }
}
