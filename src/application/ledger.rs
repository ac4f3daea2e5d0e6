//! Budget ledger service - atomic reserve / charge / release / topup.
//!
//! Every mutation runs in one store transaction that holds the budget row
//! lock from read to commit. Each operation has an `*_in` variant taking an
//! open transaction so the issuance service can pair a ledger entry with an
//! issuance transition in the same unit of work.
//!
//! Alerts are raised after commit and never fail the operation.

use std::sync::Arc;

use crate::domain::budget::{
    AlertThresholds, AlertType, Budget, BudgetAlert, BudgetPeriod, LedgerEntry, LedgerError,
    LedgerRef, ReconciliationReport, Reservation, ReferenceState,
};
use crate::domain::foundation::{BudgetId, Currency, DomainError, ErrorCode, TenantId};
use crate::domain::issuance::Issuance;
use crate::ports::{AlertSink, RewardsStore, RewardsTx};

/// Entries returned by `list_entries` when no limit is given.
pub const DEFAULT_ENTRY_LIMIT: u32 = 50;

/// Upper bound on `list_entries`.
pub const MAX_ENTRY_LIMIT: u32 = 500;

/// Command to create a budget.
#[derive(Debug, Clone)]
pub struct CreateBudgetCommand {
    pub tenant_id: TenantId,
    pub name: String,
    pub currency: Currency,
    pub soft_cap: i64,
    pub hard_cap: i64,
    pub period: BudgetPeriod,
}

/// Command shared by reserve, charge and release.
#[derive(Debug, Clone)]
pub struct LedgerCommand {
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub amount: i64,
    pub currency: Currency,
    pub reference: LedgerRef,
}

impl LedgerCommand {
    /// Command against the hold taken for `issuance`.
    pub fn for_issuance(issuance: &Issuance) -> Self {
        Self {
            tenant_id: issuance.tenant_id,
            budget_id: issuance.budget_id,
            amount: issuance.cost_amount,
            currency: issuance.currency,
            reference: issuance.ledger_ref(),
        }
    }
}

/// Command to add headroom to a budget.
#[derive(Debug, Clone)]
pub struct TopupCommand {
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub amount: i64,
    pub currency: Currency,
}

/// What a reservation wrote, for alerting after commit.
#[derive(Debug, Clone)]
pub struct ReserveOutcome {
    pub budget: Budget,
    pub entry: LedgerEntry,
    pub reservation: Reservation,
}

/// The budget ledger.
pub struct BudgetLedger {
    store: Arc<dyn RewardsStore>,
    alerts: Arc<dyn AlertSink>,
    thresholds: AlertThresholds,
}

impl BudgetLedger {
    pub fn new(
        store: Arc<dyn RewardsStore>,
        alerts: Arc<dyn AlertSink>,
        thresholds: AlertThresholds,
    ) -> Self {
        Self {
            store,
            alerts,
            thresholds,
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Budgets
    // ════════════════════════════════════════════════════════════════════════

    pub async fn create_budget(&self, cmd: CreateBudgetCommand) -> Result<Budget, LedgerError> {
        let budget = Budget::create(
            cmd.tenant_id,
            cmd.name,
            cmd.currency,
            cmd.soft_cap,
            cmd.hard_cap,
            cmd.period,
        )?;
        self.store.insert_budget(&budget).await?;

        tracing::info!(
            tenant_id = %budget.tenant_id,
            budget_id = %budget.id,
            hard_cap = budget.hard_cap,
            currency = %budget.currency,
            "Budget created"
        );
        Ok(budget)
    }

    pub async fn get_budget(
        &self,
        tenant_id: &TenantId,
        budget_id: &BudgetId,
    ) -> Result<Budget, LedgerError> {
        self.store
            .find_budget(tenant_id, budget_id)
            .await?
            .ok_or(LedgerError::BudgetNotFound(*budget_id))
    }

    pub async fn list_budgets(&self, tenant_id: &TenantId) -> Result<Vec<Budget>, LedgerError> {
        Ok(self.store.list_budgets(tenant_id).await?)
    }

    /// Newest entries first. `limit` defaults to 50 and is capped at 500.
    pub async fn list_entries(
        &self,
        tenant_id: &TenantId,
        budget_id: &BudgetId,
        limit: Option<u32>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.get_budget(tenant_id, budget_id).await?;
        let limit = limit
            .unwrap_or(DEFAULT_ENTRY_LIMIT)
            .clamp(1, MAX_ENTRY_LIMIT);
        Ok(self
            .store
            .list_ledger_entries(tenant_id, budget_id, limit)
            .await?)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Reserve
    // ════════════════════════════════════════════════════════════════════════

    /// Places a hold. Emits threshold alerts after commit, or a
    /// hard-cap-reached alert when rejected for insufficient funds.
    pub async fn reserve(&self, cmd: LedgerCommand) -> Result<Reservation, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = self.reserve_in(tx.as_mut(), &cmd).await;

        match result {
            Ok(outcome) => {
                tx.commit().await?;
                self.notify_reserved(&outcome).await;
                Ok(outcome.reservation)
            }
            Err(e) => {
                drop(tx);
                if matches!(e, LedgerError::InsufficientFunds { .. }) {
                    self.notify_rejected(&cmd.tenant_id, &cmd.budget_id).await;
                }
                Err(e)
            }
        }
    }

    /// Reserve inside an open transaction. The caller commits and then calls
    /// [`BudgetLedger::notify_reserved`].
    pub async fn reserve_in(
        &self,
        tx: &mut dyn RewardsTx,
        cmd: &LedgerCommand,
    ) -> Result<ReserveOutcome, LedgerError> {
        let mut budget = lock_budget(tx, &cmd.tenant_id, &cmd.budget_id).await?;

        let (entry, reservation) =
            match budget.reserve(cmd.amount, cmd.currency, cmd.reference.clone()) {
                Ok(result) => result,
                Err(e) => {
                    tracing::debug!(
                        budget_id = %cmd.budget_id,
                        amount = cmd.amount,
                        error = %e,
                        "Reservation rejected"
                    );
                    return Err(e);
                }
            };

        tx.append_ledger_entry(&entry).await?;
        tx.update_budget(&budget).await?;

        tracing::debug!(
            budget_id = %budget.id,
            reference = %cmd.reference,
            amount = cmd.amount,
            new_balance = reservation.new_balance,
            "Budget reserved"
        );
        Ok(ReserveOutcome {
            budget,
            entry,
            reservation,
        })
    }

    // ════════════════════════════════════════════════════════════════════════
    // Charge / Release / Topup
    // ════════════════════════════════════════════════════════════════════════

    pub async fn charge(&self, cmd: LedgerCommand) -> Result<LedgerEntry, LedgerError> {
        let mut tx = self.store.begin().await?;
        let entry = self.charge_in(tx.as_mut(), &cmd).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Finalizes a reservation. At most one charge per reference.
    pub async fn charge_in(
        &self,
        tx: &mut dyn RewardsTx,
        cmd: &LedgerCommand,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut budget = lock_budget(tx, &cmd.tenant_id, &cmd.budget_id).await?;
        let state = reference_state(tx, &cmd.budget_id, &cmd.reference).await?;

        let entry = budget.charge(cmd.amount, cmd.currency, cmd.reference.clone(), &state)?;
        tx.append_ledger_entry(&entry)
            .await
            .map_err(|e| conflict_or_storage(e, &cmd.reference))?;
        tx.update_budget(&budget).await?;

        tracing::debug!(
            budget_id = %budget.id,
            reference = %cmd.reference,
            amount = cmd.amount,
            "Reservation charged"
        );
        Ok(entry)
    }

    pub async fn release(&self, cmd: LedgerCommand) -> Result<LedgerEntry, LedgerError> {
        let mut tx = self.store.begin().await?;
        let entry = self.release_in(tx.as_mut(), &cmd).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Reverses an outstanding, uncharged reservation.
    pub async fn release_in(
        &self,
        tx: &mut dyn RewardsTx,
        cmd: &LedgerCommand,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut budget = lock_budget(tx, &cmd.tenant_id, &cmd.budget_id).await?;
        let state = reference_state(tx, &cmd.budget_id, &cmd.reference).await?;

        let entry = budget.release(cmd.amount, cmd.currency, cmd.reference.clone(), &state)?;
        tx.append_ledger_entry(&entry).await?;
        tx.update_budget(&budget).await?;

        tracing::debug!(
            budget_id = %budget.id,
            reference = %cmd.reference,
            amount = cmd.amount,
            new_balance = budget.balance,
            "Reservation released"
        );
        Ok(entry)
    }

    pub async fn topup(&self, cmd: TopupCommand) -> Result<Budget, LedgerError> {
        let mut tx = self.store.begin().await?;
        let mut budget = lock_budget(tx.as_mut(), &cmd.tenant_id, &cmd.budget_id).await?;

        let entry = budget.topup(cmd.amount, cmd.currency)?;
        tx.append_ledger_entry(&entry).await?;
        tx.update_budget(&budget).await?;
        tx.commit().await?;

        tracing::info!(
            budget_id = %budget.id,
            amount = cmd.amount,
            new_balance = budget.balance,
            "Budget topped up"
        );
        Ok(budget)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Reconcile
    // ════════════════════════════════════════════════════════════════════════

    /// Recomputes the balance from the ledger. Reports, never corrects.
    pub async fn reconcile(
        &self,
        tenant_id: &TenantId,
        budget_id: &BudgetId,
    ) -> Result<ReconciliationReport, LedgerError> {
        let mut tx = self.store.begin().await?;
        let budget = lock_budget(tx.as_mut(), tenant_id, budget_id).await?;
        let entries = tx.ledger_entries_for_budget(budget_id).await?;
        tx.rollback().await?;

        let report = budget.reconcile(&entries);
        if !report.is_balanced() {
            tracing::error!(
                budget_id = %budget_id,
                stored = report.stored_balance,
                expected = report.expected_balance,
                discrepancy = report.discrepancy,
                "Budget balance does not match its ledger"
            );
        }
        Ok(report)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Alerts
    // ════════════════════════════════════════════════════════════════════════

    /// Sends the most severe threshold alert a committed reservation crossed.
    pub async fn notify_reserved(&self, outcome: &ReserveOutcome) {
        let crossed = self.thresholds.crossed(
            outcome.reservation.previous_utilization_percent,
            outcome.reservation.utilization_percent,
        );
        if let Some(alert_type) = crossed {
            self.send_alert(BudgetAlert::for_budget(&outcome.budget, alert_type))
                .await;
        }
    }

    /// Sends a hard-cap-reached alert for a rejected reservation. Must be
    /// called after the rejecting transaction has ended.
    pub async fn notify_rejected(&self, tenant_id: &TenantId, budget_id: &BudgetId) {
        match self.store.find_budget(tenant_id, budget_id).await {
            Ok(Some(budget)) => {
                self.send_alert(BudgetAlert::for_budget(&budget, AlertType::HardCapReached))
                    .await
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(
                budget_id = %budget_id,
                error = %e,
                "Could not load budget for hard cap alert"
            ),
        }
    }

    async fn send_alert(&self, alert: BudgetAlert) {
        if let Err(e) = self.alerts.send(&alert).await {
            tracing::warn!(
                budget_id = %alert.budget_id,
                alert_type = alert.alert_type.as_str(),
                error = %e,
                "Failed to deliver budget alert"
            );
        }
    }
}

async fn lock_budget(
    tx: &mut dyn RewardsTx,
    tenant_id: &TenantId,
    budget_id: &BudgetId,
) -> Result<Budget, LedgerError> {
    tx.lock_budget(tenant_id, budget_id)
        .await?
        .ok_or(LedgerError::BudgetNotFound(*budget_id))
}

async fn reference_state(
    tx: &mut dyn RewardsTx,
    budget_id: &BudgetId,
    reference: &LedgerRef,
) -> Result<ReferenceState, LedgerError> {
    let entries = tx.ledger_entries_for_ref(budget_id, reference).await?;
    Ok(ReferenceState::from_entries(&entries))
}

/// Maps the store's one-charge-per-reference backstop onto `AlreadyCharged`.
fn conflict_or_storage(err: DomainError, reference: &LedgerRef) -> LedgerError {
    if err.code == ErrorCode::AlreadyCharged {
        LedgerError::AlreadyCharged {
            reference: reference.to_string(),
        }
    } else {
        LedgerError::Storage(err)
    }
}
