//! PostgreSQL implementation of RewardsStore.
//!
//! Budget and issuance locks are `SELECT ... FOR UPDATE` row locks held by
//! the open `sqlx::Transaction`. Voucher claims and expiry sweeps use
//! `FOR UPDATE SKIP LOCKED` so concurrent claimants never block on, or
//! double-process, the same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::budget::{Budget, EntryType, LedgerEntry, LedgerRef};
use crate::domain::foundation::{
    BudgetId, CampaignId, CustomerId, DomainError, ErrorCode, IssuanceId, LedgerEntryId,
    RewardId, TenantId, Timestamp, VoucherCodeId,
};
use crate::domain::issuance::Issuance;
use crate::domain::reward::{Reward, VoucherCode};
use crate::ports::{RewardsStore, RewardsTx};

const CHARGE_UNIQUE_INDEX: &str = "ledger_entries_one_charge_per_ref";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> DomainError {
    move |e| DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

fn corrupt(field: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} in database: {}", field, err),
    )
}

fn ts(dt: DateTime<Utc>) -> Timestamp {
    Timestamp::from_datetime(dt)
}

fn opt_dt(t: &Option<Timestamp>) -> Option<DateTime<Utc>> {
    t.map(|t| *t.as_datetime())
}

// ════════════════════════════════════════════════════════════════════════════
// Rows
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct BudgetRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    currency: String,
    soft_cap: i64,
    hard_cap: i64,
    balance: i64,
    period: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BudgetRow> for Budget {
    type Error = DomainError;

    fn try_from(row: BudgetRow) -> Result<Self, Self::Error> {
        Ok(Budget {
            id: BudgetId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            currency: row.currency.parse().map_err(|e| corrupt("currency", e))?,
            soft_cap: row.soft_cap,
            hard_cap: row.hard_cap,
            balance: row.balance,
            period: row.period.parse()?,
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerEntryRow {
    id: Uuid,
    tenant_id: Uuid,
    budget_id: Uuid,
    entry_type: String,
    currency: String,
    amount: i64,
    ref_type: Option<String>,
    ref_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = DomainError;

    fn try_from(row: LedgerEntryRow) -> Result<Self, Self::Error> {
        let reference = match (row.ref_type, row.ref_id) {
            (Some(ref_type), Some(ref_id)) => Some(LedgerRef::new(ref_type, ref_id)),
            _ => None,
        };
        Ok(LedgerEntry {
            id: LedgerEntryId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            budget_id: BudgetId::from_uuid(row.budget_id),
            entry_type: row.entry_type.parse()?,
            currency: row.currency.parse().map_err(|e| corrupt("currency", e))?,
            amount: row.amount,
            reference,
            created_at: ts(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IssuanceRow {
    id: Uuid,
    tenant_id: Uuid,
    customer_id: Uuid,
    campaign_id: Option<Uuid>,
    reward_id: Uuid,
    budget_id: Uuid,
    status: String,
    code: Option<String>,
    external_ref: Option<String>,
    currency: String,
    cost_amount: i64,
    face_amount: i64,
    metadata: serde_json::Value,
    failure_reason: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    redeemed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IssuanceRow> for Issuance {
    type Error = DomainError;

    fn try_from(row: IssuanceRow) -> Result<Self, Self::Error> {
        Ok(Issuance {
            id: IssuanceId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            campaign_id: row.campaign_id.map(CampaignId::from_uuid),
            reward_id: RewardId::from_uuid(row.reward_id),
            budget_id: BudgetId::from_uuid(row.budget_id),
            status: row.status.parse()?,
            code: row.code,
            external_ref: row.external_ref,
            currency: row.currency.parse().map_err(|e| corrupt("currency", e))?,
            cost_amount: row.cost_amount,
            face_amount: row.face_amount,
            metadata: row.metadata,
            failure_reason: row.failure_reason,
            issued_at: row.issued_at.map(ts),
            expires_at: row.expires_at.map(ts),
            redeemed_at: row.redeemed_at.map(ts),
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RewardRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    kind: String,
    config: serde_json::Value,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RewardRow> for Reward {
    fn from(row: RewardRow) -> Self {
        Reward {
            id: RewardId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            kind: row.kind,
            config: row.config,
            active: row.active,
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VoucherCodeRow {
    id: Uuid,
    tenant_id: Uuid,
    reward_id: Uuid,
    code: String,
    status: String,
    issuance_id: Option<Uuid>,
    claimed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<VoucherCodeRow> for VoucherCode {
    type Error = DomainError;

    fn try_from(row: VoucherCodeRow) -> Result<Self, Self::Error> {
        Ok(VoucherCode {
            id: VoucherCodeId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            reward_id: RewardId::from_uuid(row.reward_id),
            code: row.code,
            status: row.status.parse()?,
            issuance_id: row.issuance_id.map(IssuanceId::from_uuid),
            claimed_at: row.claimed_at.map(ts),
            created_at: ts(row.created_at),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Store
// ════════════════════════════════════════════════════════════════════════════

/// PostgreSQL implementation of the RewardsStore port.
#[derive(Clone)]
pub struct PostgresRewardsStore {
    pool: PgPool,
}

impl PostgresRewardsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RewardsStore for PostgresRewardsStore {
    async fn begin(&self) -> Result<Box<dyn RewardsTx>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;
        Ok(Box::new(PostgresRewardsTx { tx }))
    }

    async fn insert_budget(&self, budget: &Budget) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO budgets (
                id, tenant_id, name, currency, soft_cap, hard_cap, balance, period,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(budget.id.as_uuid())
        .bind(budget.tenant_id.as_uuid())
        .bind(&budget.name)
        .bind(budget.currency.code())
        .bind(budget.soft_cap)
        .bind(budget.hard_cap)
        .bind(budget.balance)
        .bind(budget.period.as_str())
        .bind(budget.created_at.as_datetime())
        .bind(budget.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert budget"))?;
        Ok(())
    }

    async fn find_budget(
        &self,
        tenant_id: &TenantId,
        id: &BudgetId,
    ) -> Result<Option<Budget>, DomainError> {
        let row: Option<BudgetRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, name, currency, soft_cap, hard_cap, balance, period,
                   created_at, updated_at
            FROM budgets
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load budget"))?;

        row.map(Budget::try_from).transpose()
    }

    async fn list_budgets(&self, tenant_id: &TenantId) -> Result<Vec<Budget>, DomainError> {
        let rows: Vec<BudgetRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, name, currency, soft_cap, hard_cap, balance, period,
                   created_at, updated_at
            FROM budgets
            WHERE tenant_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list budgets"))?;

        rows.into_iter().map(Budget::try_from).collect()
    }

    async fn list_ledger_entries(
        &self,
        tenant_id: &TenantId,
        budget_id: &BudgetId,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, DomainError> {
        let rows: Vec<LedgerEntryRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, budget_id, entry_type, currency, amount, ref_type, ref_id,
                   created_at
            FROM ledger_entries
            WHERE budget_id = $1 AND tenant_id = $2
            ORDER BY seq DESC
            LIMIT $3
            "#,
        )
        .bind(budget_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list ledger entries"))?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn find_issuance(&self, id: &IssuanceId) -> Result<Option<Issuance>, DomainError> {
        let row: Option<IssuanceRow> = sqlx::query_as(ISSUANCE_SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load issuance"))?;

        row.map(Issuance::try_from).transpose()
    }

    async fn save_reward(&self, reward: &Reward) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO reward_catalog (id, tenant_id, name, kind, config, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                kind = EXCLUDED.kind,
                config = EXCLUDED.config,
                active = EXCLUDED.active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(reward.id.as_uuid())
        .bind(reward.tenant_id.as_uuid())
        .bind(&reward.name)
        .bind(&reward.kind)
        .bind(&reward.config)
        .bind(reward.active)
        .bind(reward.created_at.as_datetime())
        .bind(reward.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to save reward"))?;
        Ok(())
    }

    async fn insert_voucher_codes(&self, codes: &[VoucherCode]) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        for code in codes {
            sqlx::query(
                r#"
                INSERT INTO voucher_codes (
                    id, tenant_id, reward_id, code, status, issuance_id, claimed_at, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(code.id.as_uuid())
            .bind(code.tenant_id.as_uuid())
            .bind(code.reward_id.as_uuid())
            .bind(&code.code)
            .bind(code.status.as_str())
            .bind(code.issuance_id.map(|id| *id.as_uuid()))
            .bind(opt_dt(&code.claimed_at))
            .bind(code.created_at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to insert voucher code"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit voucher codes"))
    }

    async fn count_available_codes(&self, reward_id: &RewardId) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM voucher_codes WHERE reward_id = $1 AND status = 'available'",
        )
        .bind(reward_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to count voucher codes"))?;
        Ok(count.max(0) as u64)
    }

    async fn find_expired_issuance_ids(
        &self,
        now: &Timestamp,
        limit: u32,
    ) -> Result<Vec<IssuanceId>, DomainError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM issuances
            WHERE status = 'issued' AND expires_at <= $1
            ORDER BY expires_at
            LIMIT $2
            "#,
        )
        .bind(now.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to find expired issuances"))?;

        Ok(ids.into_iter().map(IssuanceId::from_uuid).collect())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Transaction
// ════════════════════════════════════════════════════════════════════════════

const ISSUANCE_COLUMNS: &str = "id, tenant_id, customer_id, campaign_id, reward_id, budget_id, \
    status, code, external_ref, currency, cost_amount, face_amount, metadata, failure_reason, \
    issued_at, expires_at, redeemed_at, created_at, updated_at";

const ISSUANCE_SELECT_BY_ID: &str = "SELECT id, tenant_id, customer_id, campaign_id, reward_id, \
    budget_id, status, code, external_ref, currency, cost_amount, face_amount, metadata, \
    failure_reason, issued_at, expires_at, redeemed_at, created_at, updated_at \
    FROM issuances WHERE id = $1";

const LEDGER_COLUMNS: &str =
    "id, tenant_id, budget_id, entry_type, currency, amount, ref_type, ref_id, created_at";

/// Open PostgreSQL transaction. Rolled back on drop unless committed.
pub struct PostgresRewardsTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RewardsTx for PostgresRewardsTx {
    async fn lock_budget(
        &mut self,
        tenant_id: &TenantId,
        id: &BudgetId,
    ) -> Result<Option<Budget>, DomainError> {
        let row: Option<BudgetRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, name, currency, soft_cap, hard_cap, balance, period,
                   created_at, updated_at
            FROM budgets
            WHERE id = $1 AND tenant_id = $2
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("Failed to lock budget"))?;

        row.map(Budget::try_from).transpose()
    }

    async fn update_budget(&mut self, budget: &Budget) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE budgets SET balance = $2, updated_at = $3 WHERE id = $1")
            .bind(budget.id.as_uuid())
            .bind(budget.balance)
            .bind(budget.updated_at.as_datetime())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("Failed to update budget"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::BudgetNotFound,
                format!("Budget not found: {}", budget.id),
            ));
        }
        Ok(())
    }

    async fn append_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<(), DomainError> {
        let (ref_type, ref_id) = match &entry.reference {
            Some(r) => (Some(r.ref_type.as_str()), Some(r.ref_id.as_str())),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, tenant_id, budget_id, entry_type, currency, amount, ref_type, ref_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.tenant_id.as_uuid())
        .bind(entry.budget_id.as_uuid())
        .bind(entry.entry_type.as_str())
        .bind(entry.currency.code())
        .bind(entry.amount)
        .bind(ref_type)
        .bind(ref_id)
        .bind(entry.created_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some(CHARGE_UNIQUE_INDEX)
                    && entry.entry_type == EntryType::Charge
                {
                    return DomainError::new(
                        ErrorCode::AlreadyCharged,
                        "Reference has already been charged",
                    );
                }
            }
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to append ledger entry: {}", e),
            )
        })?;
        Ok(())
    }

    async fn ledger_entries_for_ref(
        &mut self,
        budget_id: &BudgetId,
        reference: &LedgerRef,
    ) -> Result<Vec<LedgerEntry>, DomainError> {
        let sql = format!(
            "SELECT {} FROM ledger_entries \
             WHERE budget_id = $1 AND ref_type = $2 AND ref_id = $3 ORDER BY seq",
            LEDGER_COLUMNS
        );
        let rows: Vec<LedgerEntryRow> = sqlx::query_as(&sql)
            .bind(budget_id.as_uuid())
            .bind(&reference.ref_type)
            .bind(&reference.ref_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error("Failed to load reference entries"))?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn ledger_entries_for_budget(
        &mut self,
        budget_id: &BudgetId,
    ) -> Result<Vec<LedgerEntry>, DomainError> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE budget_id = $1 ORDER BY seq",
            LEDGER_COLUMNS
        );
        let rows: Vec<LedgerEntryRow> = sqlx::query_as(&sql)
            .bind(budget_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error("Failed to load budget entries"))?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn lock_issuance(&mut self, id: &IssuanceId) -> Result<Option<Issuance>, DomainError> {
        let sql = format!("{} FOR UPDATE", ISSUANCE_SELECT_BY_ID);
        let row: Option<IssuanceRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("Failed to lock issuance"))?;

        row.map(Issuance::try_from).transpose()
    }

    async fn claim_expired_issuance(
        &mut self,
        id: &IssuanceId,
        now: &Timestamp,
    ) -> Result<Option<Issuance>, DomainError> {
        let sql = format!(
            "SELECT {} FROM issuances \
             WHERE id = $1 AND status = 'issued' AND expires_at <= $2 \
             FOR UPDATE SKIP LOCKED",
            ISSUANCE_COLUMNS
        );
        let row: Option<IssuanceRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(now.as_datetime())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("Failed to claim expired issuance"))?;

        row.map(Issuance::try_from).transpose()
    }

    async fn insert_issuance(&mut self, issuance: &Issuance) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO issuances (
                id, tenant_id, customer_id, campaign_id, reward_id, budget_id, status, code,
                external_ref, currency, cost_amount, face_amount, metadata, failure_reason,
                issued_at, expires_at, redeemed_at, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            "#,
        )
        .bind(issuance.id.as_uuid())
        .bind(issuance.tenant_id.as_uuid())
        .bind(issuance.customer_id.as_uuid())
        .bind(issuance.campaign_id.map(|id| *id.as_uuid()))
        .bind(issuance.reward_id.as_uuid())
        .bind(issuance.budget_id.as_uuid())
        .bind(issuance.status.as_str())
        .bind(&issuance.code)
        .bind(&issuance.external_ref)
        .bind(issuance.currency.code())
        .bind(issuance.cost_amount)
        .bind(issuance.face_amount)
        .bind(&issuance.metadata)
        .bind(&issuance.failure_reason)
        .bind(opt_dt(&issuance.issued_at))
        .bind(opt_dt(&issuance.expires_at))
        .bind(opt_dt(&issuance.redeemed_at))
        .bind(issuance.created_at.as_datetime())
        .bind(issuance.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("Failed to insert issuance"))?;
        Ok(())
    }

    async fn update_issuance(&mut self, issuance: &Issuance) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE issuances SET
                status = $2,
                code = $3,
                external_ref = $4,
                metadata = $5,
                failure_reason = $6,
                issued_at = $7,
                expires_at = $8,
                redeemed_at = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(issuance.id.as_uuid())
        .bind(issuance.status.as_str())
        .bind(&issuance.code)
        .bind(&issuance.external_ref)
        .bind(&issuance.metadata)
        .bind(&issuance.failure_reason)
        .bind(opt_dt(&issuance.issued_at))
        .bind(opt_dt(&issuance.expires_at))
        .bind(opt_dt(&issuance.redeemed_at))
        .bind(issuance.updated_at.as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("Failed to update issuance"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::IssuanceNotFound,
                format!("Issuance not found: {}", issuance.id),
            ));
        }
        Ok(())
    }

    async fn find_reward(&mut self, id: &RewardId) -> Result<Option<Reward>, DomainError> {
        let row: Option<RewardRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, name, kind, config, active, created_at, updated_at
            FROM reward_catalog
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("Failed to load reward"))?;

        Ok(row.map(Reward::from))
    }

    async fn claim_voucher_code(
        &mut self,
        reward_id: &RewardId,
        issuance_id: &IssuanceId,
    ) -> Result<Option<VoucherCode>, DomainError> {
        let row: Option<VoucherCodeRow> = sqlx::query_as(
            r#"
            UPDATE voucher_codes
            SET status = 'issued', issuance_id = $2, claimed_at = $3
            WHERE id = (
                SELECT id FROM voucher_codes
                WHERE reward_id = $1 AND status = 'available'
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, tenant_id, reward_id, code, status, issuance_id, claimed_at, created_at
            "#,
        )
        .bind(reward_id.as_uuid())
        .bind(issuance_id.as_uuid())
        .bind(Timestamp::now().as_datetime())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("Failed to claim voucher code"))?;

        row.map(VoucherCode::try_from).transpose()
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(db_error("Failed to commit transaction"))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .rollback()
            .await
            .map_err(db_error("Failed to roll back transaction"))
    }
}
