//! In-memory rewards store for testing and local development.
//!
//! Row locks are emulated with one async mutex per budget, issuance and
//! voucher code. A transaction buffers its writes on top of the committed
//! tables and `commit` applies them under a short table lock before the row
//! locks are let go. Dropping the transaction throws the buffer away.
//!
//! Voucher claims and expiry claims skip rows another transaction holds,
//! matching `FOR UPDATE SKIP LOCKED`.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

use crate::domain::budget::{Budget, EntryType, LedgerEntry, LedgerRef};
use crate::domain::foundation::{
    BudgetId, DomainError, ErrorCode, IssuanceId, RewardId, TenantId, Timestamp, VoucherCodeId,
};
use crate::domain::issuance::{Issuance, IssuanceStatus};
use crate::domain::reward::{Reward, VoucherCode};
use crate::ports::{RewardsStore, RewardsTx};

#[derive(Debug, Default)]
struct Tables {
    budgets: HashMap<BudgetId, Budget>,
    ledger: Vec<LedgerEntry>,
    issuances: HashMap<IssuanceId, Issuance>,
    rewards: HashMap<RewardId, Reward>,
    voucher_codes: Vec<VoucherCode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Budget(BudgetId),
    Issuance(IssuanceId),
    VoucherCode(VoucherCodeId),
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    rows: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn row(&self, key: RowKey) -> Arc<RowMutex<()>> {
        self.rows
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(key)
            .or_default()
            .clone()
    }
}

/// In-memory implementation of [`RewardsStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryRewardsStore {
    shared: Arc<Shared>,
}

impl InMemoryRewardsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every ledger entry of a budget, oldest first. Test helper.
    pub async fn all_ledger_entries(&self, budget_id: &BudgetId) -> Vec<LedgerEntry> {
        self.shared
            .tables()
            .ledger
            .iter()
            .filter(|e| e.budget_id == *budget_id)
            .cloned()
            .collect()
    }

    /// Overwrites a stored budget balance without a ledger entry. Simulates
    /// out-of-band tampering in reconciliation tests.
    pub async fn force_balance(&self, budget_id: &BudgetId, balance: i64) {
        if let Some(budget) = self.shared.tables().budgets.get_mut(budget_id) {
            budget.balance = balance;
        }
    }
}

#[async_trait]
impl RewardsStore for InMemoryRewardsStore {
    async fn begin(&self) -> Result<Box<dyn RewardsTx>, DomainError> {
        Ok(Box::new(InMemoryRewardsTx {
            shared: self.shared.clone(),
            held: HashMap::new(),
            pending: Pending::default(),
        }))
    }

    async fn insert_budget(&self, budget: &Budget) -> Result<(), DomainError> {
        let mut tables = self.shared.tables();
        if tables.budgets.contains_key(&budget.id) {
            return Err(DomainError::database(format!(
                "Budget {} already exists",
                budget.id
            )));
        }
        tables.budgets.insert(budget.id, budget.clone());
        Ok(())
    }

    async fn find_budget(
        &self,
        tenant_id: &TenantId,
        id: &BudgetId,
    ) -> Result<Option<Budget>, DomainError> {
        Ok(self
            .shared
            .tables()
            .budgets
            .get(id)
            .filter(|b| b.tenant_id == *tenant_id)
            .cloned())
    }

    async fn list_budgets(&self, tenant_id: &TenantId) -> Result<Vec<Budget>, DomainError> {
        let mut budgets: Vec<Budget> = self
            .shared
            .tables()
            .budgets
            .values()
            .filter(|b| b.tenant_id == *tenant_id)
            .cloned()
            .collect();
        budgets.sort_by_key(|b| b.created_at);
        Ok(budgets)
    }

    async fn list_ledger_entries(
        &self,
        tenant_id: &TenantId,
        budget_id: &BudgetId,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, DomainError> {
        Ok(self
            .shared
            .tables()
            .ledger
            .iter()
            .rev()
            .filter(|e| e.budget_id == *budget_id && e.tenant_id == *tenant_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_issuance(&self, id: &IssuanceId) -> Result<Option<Issuance>, DomainError> {
        Ok(self.shared.tables().issuances.get(id).cloned())
    }

    async fn save_reward(&self, reward: &Reward) -> Result<(), DomainError> {
        self.shared
            .tables()
            .rewards
            .insert(reward.id, reward.clone());
        Ok(())
    }

    async fn insert_voucher_codes(&self, codes: &[VoucherCode]) -> Result<(), DomainError> {
        self.shared.tables().voucher_codes.extend_from_slice(codes);
        Ok(())
    }

    async fn count_available_codes(&self, reward_id: &RewardId) -> Result<u64, DomainError> {
        Ok(self
            .shared
            .tables()
            .voucher_codes
            .iter()
            .filter(|c| c.reward_id == *reward_id && c.is_available())
            .count() as u64)
    }

    async fn find_expired_issuance_ids(
        &self,
        now: &Timestamp,
        limit: u32,
    ) -> Result<Vec<IssuanceId>, DomainError> {
        let tables = self.shared.tables();
        let mut expired: Vec<&Issuance> = tables
            .issuances
            .values()
            .filter(|i| i.status == IssuanceStatus::Issued && i.is_expired_at(now))
            .collect();
        expired.sort_by_key(|i| i.expires_at);
        Ok(expired
            .into_iter()
            .take(limit as usize)
            .map(|i| i.id)
            .collect())
    }
}

/// Writes not yet visible to other transactions.
#[derive(Debug, Default)]
struct Pending {
    budgets: HashMap<BudgetId, Budget>,
    ledger: Vec<LedgerEntry>,
    issuances: HashMap<IssuanceId, Issuance>,
    inserted: HashSet<IssuanceId>,
    claimed_codes: HashMap<VoucherCodeId, VoucherCode>,
}

/// Open in-memory transaction.
pub struct InMemoryRewardsTx {
    shared: Arc<Shared>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    pending: Pending,
}

impl InMemoryRewardsTx {
    /// Waits for the row lock unless this transaction already holds it.
    async fn lock_row(&mut self, key: RowKey) {
        if self.held.contains_key(&key) {
            return;
        }
        let guard = self.shared.row(key).lock_owned().await;
        self.held.insert(key, guard);
    }

    /// Takes the row lock only if nobody else holds it.
    fn try_lock_row(&mut self, key: RowKey) -> bool {
        if self.held.contains_key(&key) {
            return true;
        }
        match self.shared.row(key).try_lock_owned() {
            Ok(guard) => {
                self.held.insert(key, guard);
                true
            }
            Err(_) => false,
        }
    }

    fn budget(&self, id: &BudgetId) -> Option<Budget> {
        self.pending
            .budgets
            .get(id)
            .cloned()
            .or_else(|| self.shared.tables().budgets.get(id).cloned())
    }

    fn issuance(&self, id: &IssuanceId) -> Option<Issuance> {
        self.pending
            .issuances
            .get(id)
            .cloned()
            .or_else(|| self.shared.tables().issuances.get(id).cloned())
    }

    fn entries_for_budget(&self, budget_id: &BudgetId) -> Vec<LedgerEntry> {
        self.shared
            .tables()
            .ledger
            .iter()
            .chain(self.pending.ledger.iter())
            .filter(|e| e.budget_id == *budget_id)
            .cloned()
            .collect()
    }

    fn entries_for_ref(&self, budget_id: &BudgetId, reference: &LedgerRef) -> Vec<LedgerEntry> {
        self.entries_for_budget(budget_id)
            .into_iter()
            .filter(|e| e.reference.as_ref() == Some(reference))
            .collect()
    }
}

#[async_trait]
impl RewardsTx for InMemoryRewardsTx {
    async fn lock_budget(
        &mut self,
        tenant_id: &TenantId,
        id: &BudgetId,
    ) -> Result<Option<Budget>, DomainError> {
        self.lock_row(RowKey::Budget(*id)).await;
        Ok(self.budget(id).filter(|b| b.tenant_id == *tenant_id))
    }

    async fn update_budget(&mut self, budget: &Budget) -> Result<(), DomainError> {
        if self.budget(&budget.id).is_none() {
            return Err(DomainError::new(
                ErrorCode::BudgetNotFound,
                format!("Budget not found: {}", budget.id),
            ));
        }
        self.pending.budgets.insert(budget.id, budget.clone());
        Ok(())
    }

    async fn append_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<(), DomainError> {
        if entry.entry_type == EntryType::Charge {
            if let Some(reference) = &entry.reference {
                let duplicate = self
                    .entries_for_ref(&entry.budget_id, reference)
                    .iter()
                    .any(|e| e.entry_type == EntryType::Charge);
                if duplicate {
                    return Err(DomainError::new(
                        ErrorCode::AlreadyCharged,
                        format!("Reference {} has already been charged", reference),
                    ));
                }
            }
        }
        self.pending.ledger.push(entry.clone());
        Ok(())
    }

    async fn ledger_entries_for_ref(
        &mut self,
        budget_id: &BudgetId,
        reference: &LedgerRef,
    ) -> Result<Vec<LedgerEntry>, DomainError> {
        Ok(self.entries_for_ref(budget_id, reference))
    }

    async fn ledger_entries_for_budget(
        &mut self,
        budget_id: &BudgetId,
    ) -> Result<Vec<LedgerEntry>, DomainError> {
        Ok(self.entries_for_budget(budget_id))
    }

    async fn lock_issuance(&mut self, id: &IssuanceId) -> Result<Option<Issuance>, DomainError> {
        self.lock_row(RowKey::Issuance(*id)).await;
        Ok(self.issuance(id))
    }

    async fn claim_expired_issuance(
        &mut self,
        id: &IssuanceId,
        now: &Timestamp,
    ) -> Result<Option<Issuance>, DomainError> {
        if !self.try_lock_row(RowKey::Issuance(*id)) {
            return Ok(None);
        }
        Ok(self
            .issuance(id)
            .filter(|i| i.status == IssuanceStatus::Issued && i.is_expired_at(now)))
    }

    async fn insert_issuance(&mut self, issuance: &Issuance) -> Result<(), DomainError> {
        if self.issuance(&issuance.id).is_some() {
            return Err(DomainError::database(format!(
                "Issuance {} already exists",
                issuance.id
            )));
        }
        self.pending.inserted.insert(issuance.id);
        self.pending.issuances.insert(issuance.id, issuance.clone());
        Ok(())
    }

    async fn update_issuance(&mut self, issuance: &Issuance) -> Result<(), DomainError> {
        if self.issuance(&issuance.id).is_none() {
            return Err(DomainError::new(
                ErrorCode::IssuanceNotFound,
                format!("Issuance not found: {}", issuance.id),
            ));
        }
        self.pending.issuances.insert(issuance.id, issuance.clone());
        Ok(())
    }

    async fn find_reward(&mut self, id: &RewardId) -> Result<Option<Reward>, DomainError> {
        Ok(self.shared.tables().rewards.get(id).cloned())
    }

    async fn claim_voucher_code(
        &mut self,
        reward_id: &RewardId,
        issuance_id: &IssuanceId,
    ) -> Result<Option<VoucherCode>, DomainError> {
        let candidates: Vec<VoucherCode> = self
            .shared
            .tables()
            .voucher_codes
            .iter()
            .filter(|c| c.reward_id == *reward_id && c.is_available())
            .filter(|c| !self.pending.claimed_codes.contains_key(&c.id))
            .cloned()
            .collect();

        for mut code in candidates {
            if !self.try_lock_row(RowKey::VoucherCode(code.id)) {
                continue;
            }
            // Another transaction may have claimed and committed it since the scan.
            let still_available = self
                .shared
                .tables()
                .voucher_codes
                .iter()
                .any(|c| c.id == code.id && c.is_available());
            if !still_available {
                continue;
            }
            code.claim(*issuance_id);
            self.pending.claimed_codes.insert(code.id, code.clone());
            return Ok(Some(code));
        }
        Ok(None)
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let InMemoryRewardsTx {
            shared,
            held,
            pending,
        } = *self;
        {
            let mut tables = shared.tables();
            if pending
                .inserted
                .iter()
                .any(|id| tables.issuances.contains_key(id))
            {
                return Err(DomainError::database("Issuance already exists"));
            }
            tables.budgets.extend(pending.budgets);
            tables.ledger.extend(pending.ledger);
            tables.issuances.extend(pending.issuances);
            for code in tables.voucher_codes.iter_mut() {
                if let Some(claimed) = pending.claimed_codes.get(&code.id) {
                    *code = claimed.clone();
                }
            }
        }
        drop(held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::budget::BudgetPeriod;
    use crate::domain::foundation::Currency;
    use std::time::Duration;

    async fn store_with_budget() -> (InMemoryRewardsStore, Budget) {
        let store = InMemoryRewardsStore::new();
        let budget = Budget::create(
            TenantId::new(),
            "main",
            Currency::Usd,
            800,
            1000,
            BudgetPeriod::Rolling,
        )
        .unwrap();
        store.insert_budget(&budget).await.unwrap();
        (store, budget)
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let (store, budget) = store_with_budget().await;
        let mut tx = store.begin().await.unwrap();
        let mut locked = tx
            .lock_budget(&budget.tenant_id, &budget.id)
            .await
            .unwrap()
            .unwrap();
        let (entry, _) = locked
            .reserve(100, Currency::Usd, LedgerRef::new("issuance", "a"))
            .unwrap();
        tx.append_ledger_entry(&entry).await.unwrap();
        tx.update_budget(&locked).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store
            .find_budget(&budget.tenant_id, &budget.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.balance, 100);
        assert_eq!(store.all_ledger_entries(&budget.id).await.len(), 1);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let (store, budget) = store_with_budget().await;
        {
            let mut tx = store.begin().await.unwrap();
            let mut locked = tx
                .lock_budget(&budget.tenant_id, &budget.id)
                .await
                .unwrap()
                .unwrap();
            locked.balance = 999;
            tx.update_budget(&locked).await.unwrap();
        }

        let stored = store
            .find_budget(&budget.tenant_id, &budget.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.balance, 0);
    }

    #[tokio::test]
    async fn budget_is_invisible_to_other_tenants() {
        let (store, budget) = store_with_budget().await;
        assert!(store
            .find_budget(&TenantId::new(), &budget.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn second_charge_for_reference_is_rejected() {
        let (store, budget) = store_with_budget().await;
        let reference = LedgerRef::new("issuance", "a");
        let charge = LedgerEntry::new(
            budget.tenant_id,
            budget.id,
            EntryType::Charge,
            Currency::Usd,
            10,
            Some(reference.clone()),
        );

        let mut tx = store.begin().await.unwrap();
        tx.append_ledger_entry(&charge).await.unwrap();
        let mut again = charge.clone();
        again.id = crate::domain::foundation::LedgerEntryId::new();
        let err = tx.append_ledger_entry(&again).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyCharged);
    }

    #[tokio::test]
    async fn voucher_codes_are_claimed_once() {
        let store = InMemoryRewardsStore::new();
        let tenant = TenantId::new();
        let reward = RewardId::new();
        store
            .insert_voucher_codes(&[VoucherCode::available(tenant, reward, "ONLY-ONE")])
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let first = tx
            .claim_voucher_code(&reward, &IssuanceId::new())
            .await
            .unwrap();
        let second = tx
            .claim_voucher_code(&reward, &IssuanceId::new())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.map(|c| c.code), Some("ONLY-ONE".to_string()));
        assert!(second.is_none());
        assert_eq!(store.count_available_codes(&reward).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn budget_lock_waits_for_holder_and_sees_its_commit() {
        let (store, budget) = store_with_budget().await;
        let mut first = store.begin().await.unwrap();
        let mut locked = first
            .lock_budget(&budget.tenant_id, &budget.id)
            .await
            .unwrap()
            .unwrap();

        let contender = {
            let store = store.clone();
            let (tenant, id) = (budget.tenant_id, budget.id);
            tokio::spawn(async move {
                let mut tx = store.begin().await.unwrap();
                tx.lock_budget(&tenant, &id).await.unwrap().unwrap().balance
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        locked.balance = 250;
        first.update_budget(&locked).await.unwrap();
        first.commit().await.unwrap();

        assert_eq!(contender.await.unwrap(), 250);
    }

    #[tokio::test]
    async fn locks_on_different_budgets_are_independent() {
        let (store, budget) = store_with_budget().await;
        let other = Budget::create(
            budget.tenant_id,
            "other",
            Currency::Usd,
            800,
            1000,
            BudgetPeriod::Rolling,
        )
        .unwrap();
        store.insert_budget(&other).await.unwrap();

        let mut held = store.begin().await.unwrap();
        held.lock_budget(&budget.tenant_id, &budget.id).await.unwrap();
        held.lock_issuance(&IssuanceId::new()).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let locked = tokio::time::timeout(
            Duration::from_millis(100),
            tx.lock_budget(&other.tenant_id, &other.id),
        )
        .await
        .expect("independent budget must not wait");
        assert!(locked.unwrap().is_some());
        assert_eq!(
            store
                .find_budget(&budget.tenant_id, &budget.id)
                .await
                .unwrap()
                .unwrap()
                .balance,
            0
        );
    }

    #[tokio::test]
    async fn same_transaction_can_relock_its_rows() {
        let (store, budget) = store_with_budget().await;
        let mut tx = store.begin().await.unwrap();
        tx.lock_budget(&budget.tenant_id, &budget.id).await.unwrap();

        let again = tokio::time::timeout(
            Duration::from_millis(100),
            tx.lock_budget(&budget.tenant_id, &budget.id),
        )
        .await
        .expect("relock must not wait");
        assert!(again.unwrap().is_some());
    }

    #[tokio::test]
    async fn voucher_code_held_by_open_transaction_is_skipped() {
        let store = InMemoryRewardsStore::new();
        let tenant = TenantId::new();
        let reward = RewardId::new();
        store
            .insert_voucher_codes(&[
                VoucherCode::available(tenant, reward, "A"),
                VoucherCode::available(tenant, reward, "B"),
            ])
            .await
            .unwrap();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        let a = first.claim_voucher_code(&reward, &IssuanceId::new()).await.unwrap();
        let b = second.claim_voucher_code(&reward, &IssuanceId::new()).await.unwrap();
        assert_ne!(a.as_ref().map(|c| &c.code), b.as_ref().map(|c| &c.code));
        second.commit().await.unwrap();
        drop(first);

        assert_eq!(store.count_available_codes(&reward).await.unwrap(), 1);
        let mut third = store.begin().await.unwrap();
        let again = third.claim_voucher_code(&reward, &IssuanceId::new()).await.unwrap();
        assert_eq!(again.map(|c| c.code), a.map(|c| c.code));
    }

    #[tokio::test]
    async fn locked_issuance_is_skipped_by_expiry_claim() {
        let store = InMemoryRewardsStore::new();
        let id = IssuanceId::new();
        let mut holder = store.begin().await.unwrap();
        holder.lock_issuance(&id).await.unwrap();

        let mut sweeper = store.begin().await.unwrap();
        let claimed = sweeper
            .claim_expired_issuance(&id, &Timestamp::now())
            .await
            .unwrap();

        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn ledger_listing_is_newest_first_and_limited() {
        let (store, budget) = store_with_budget().await;
        let mut tx = store.begin().await.unwrap();
        for amount in 1..=5 {
            let entry = LedgerEntry::new(
                budget.tenant_id,
                budget.id,
                EntryType::Topup,
                Currency::Usd,
                amount,
                None,
            );
            tx.append_ledger_entry(&entry).await.unwrap();
        }
        tx.commit().await.unwrap();

        let entries = store
            .list_ledger_entries(&budget.tenant_id, &budget.id, 2)
            .await
            .unwrap();
        let amounts: Vec<i64> = entries.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![5, 4]);
    }
}
