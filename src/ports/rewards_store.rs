//! Rewards store port - transactional persistence for the financial core.
//!
//! Budget ledger mutations and issuance transitions must commit together or
//! not at all. The store therefore hands out unit-of-work transactions:
//!
//! ```ignore
//! let mut tx = store.begin().await?;
//! let mut budget = tx.lock_budget(&tenant_id, &budget_id).await?
//!     .ok_or(LedgerError::BudgetNotFound(budget_id))?;
//! let (entry, outcome) = budget.reserve(amount, currency, reference)?;
//! tx.append_ledger_entry(&entry).await?;
//! tx.update_budget(&budget).await?;
//! tx.commit().await?;
//! ```
//!
//! Dropping a transaction without calling `commit` discards every write made
//! through it.
//!
//! # Locking
//!
//! - `lock_budget` and `lock_issuance` take an exclusive row lock held until
//!   the transaction ends. Concurrent callers wait.
//! - `claim_voucher_code` and `claim_expired_issuance` skip rows already
//!   locked by another transaction instead of waiting.

use async_trait::async_trait;

use crate::domain::budget::{Budget, LedgerEntry, LedgerRef};
use crate::domain::foundation::{
    BudgetId, DomainError, IssuanceId, RewardId, TenantId, Timestamp,
};
use crate::domain::issuance::Issuance;
use crate::domain::reward::{Reward, VoucherCode};

/// Entry point for all rewards persistence.
#[async_trait]
pub trait RewardsStore: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<Box<dyn RewardsTx>, DomainError>;

    /// Inserts a newly created budget.
    async fn insert_budget(&self, budget: &Budget) -> Result<(), DomainError>;

    async fn find_budget(
        &self,
        tenant_id: &TenantId,
        id: &BudgetId,
    ) -> Result<Option<Budget>, DomainError>;

    /// Lists a tenant's budgets ordered by creation time.
    async fn list_budgets(&self, tenant_id: &TenantId) -> Result<Vec<Budget>, DomainError>;

    /// Returns up to `limit` entries of a budget, newest first.
    async fn list_ledger_entries(
        &self,
        tenant_id: &TenantId,
        budget_id: &BudgetId,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, DomainError>;

    async fn find_issuance(&self, id: &IssuanceId) -> Result<Option<Issuance>, DomainError>;

    /// Inserts or replaces a catalog entry.
    async fn save_reward(&self, reward: &Reward) -> Result<(), DomainError>;

    /// Adds codes to a reward's pool.
    async fn insert_voucher_codes(&self, codes: &[VoucherCode]) -> Result<(), DomainError>;

    /// Counts unclaimed codes left in a reward's pool.
    async fn count_available_codes(&self, reward_id: &RewardId) -> Result<u64, DomainError>;

    /// Lists `issued` issuances whose `expires_at` is at or before `now`,
    /// oldest expiry first.
    async fn find_expired_issuance_ids(
        &self,
        now: &Timestamp,
        limit: u32,
    ) -> Result<Vec<IssuanceId>, DomainError>;
}

/// One open unit of work.
#[async_trait]
pub trait RewardsTx: Send {
    /// Loads and exclusively locks a budget row.
    async fn lock_budget(
        &mut self,
        tenant_id: &TenantId,
        id: &BudgetId,
    ) -> Result<Option<Budget>, DomainError>;

    /// Writes back balance and timestamps of a locked budget.
    async fn update_budget(&mut self, budget: &Budget) -> Result<(), DomainError>;

    /// Appends an immutable ledger entry.
    ///
    /// # Errors
    ///
    /// - `AlreadyCharged` if a charge already exists for the entry's
    ///   reference
    async fn append_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<(), DomainError>;

    /// Every entry recorded for one reference on a budget, oldest first.
    async fn ledger_entries_for_ref(
        &mut self,
        budget_id: &BudgetId,
        reference: &LedgerRef,
    ) -> Result<Vec<LedgerEntry>, DomainError>;

    /// Every entry of a budget, oldest first.
    async fn ledger_entries_for_budget(
        &mut self,
        budget_id: &BudgetId,
    ) -> Result<Vec<LedgerEntry>, DomainError>;

    /// Loads and exclusively locks an issuance row.
    async fn lock_issuance(&mut self, id: &IssuanceId) -> Result<Option<Issuance>, DomainError>;

    /// Locks an issuance only if it is still `issued`, past `now`, and not
    /// locked by another transaction.
    async fn claim_expired_issuance(
        &mut self,
        id: &IssuanceId,
        now: &Timestamp,
    ) -> Result<Option<Issuance>, DomainError>;

    async fn insert_issuance(&mut self, issuance: &Issuance) -> Result<(), DomainError>;

    async fn update_issuance(&mut self, issuance: &Issuance) -> Result<(), DomainError>;

    async fn find_reward(&mut self, id: &RewardId) -> Result<Option<Reward>, DomainError>;

    /// Claims one available code from a reward's pool for `issuance_id`.
    ///
    /// Returns `None` when the pool is exhausted.
    async fn claim_voucher_code(
        &mut self,
        reward_id: &RewardId,
        issuance_id: &IssuanceId,
    ) -> Result<Option<VoucherCode>, DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}
