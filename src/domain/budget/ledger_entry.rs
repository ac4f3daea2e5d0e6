//! Immutable ledger entries and per-reference bookkeeping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    BudgetId, Currency, DomainError, ErrorCode, IssuanceId, LedgerEntryId, TenantId, Timestamp,
};

/// Kind of budget-affecting event recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Reserve,
    Charge,
    Release,
    Topup,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Reserve => "reserve",
            EntryType::Charge => "charge",
            EntryType::Release => "release",
            EntryType::Topup => "topup",
        }
    }

    /// Sign applied to an entry's amount when summing the budget balance.
    ///
    /// A charge finalizes an existing hold and therefore moves nothing.
    pub fn balance_sign(&self) -> i64 {
        match self {
            EntryType::Reserve => 1,
            EntryType::Charge => 0,
            EntryType::Release | EntryType::Topup => -1,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserve" => Ok(EntryType::Reserve),
            "charge" => Ok(EntryType::Charge),
            "release" => Ok(EntryType::Release),
            "topup" => Ok(EntryType::Topup),
            other => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Invalid ledger entry type: {}", other),
            )),
        }
    }
}

/// Object a ledger entry is attached to, e.g. `("issuance", <uuid>)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerRef {
    pub ref_type: String,
    pub ref_id: String,
}

impl LedgerRef {
    pub fn new(ref_type: impl Into<String>, ref_id: impl Into<String>) -> Self {
        Self {
            ref_type: ref_type.into(),
            ref_id: ref_id.into(),
        }
    }

    /// Reference used for every issuance-backed reservation.
    pub fn issuance(id: IssuanceId) -> Self {
        Self::new("issuance", id.to_string())
    }
}

impl fmt::Display for LedgerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ref_type, self.ref_id)
    }
}

/// One append-only ledger record.
///
/// `amount` is always the positive magnitude; the balance effect is derived
/// from `entry_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub entry_type: EntryType,
    pub currency: Currency,
    pub amount: i64,
    pub reference: Option<LedgerRef>,
    pub created_at: Timestamp,
}

impl LedgerEntry {
    pub fn new(
        tenant_id: TenantId,
        budget_id: BudgetId,
        entry_type: EntryType,
        currency: Currency,
        amount: i64,
        reference: Option<LedgerRef>,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            tenant_id,
            budget_id,
            entry_type,
            currency,
            amount,
            reference,
            created_at: Timestamp::now(),
        }
    }

    /// Signed contribution of this entry to the budget balance.
    pub fn signed_amount(&self) -> i64 {
        self.entry_type.balance_sign() * self.amount
    }
}

/// Summary of all entries recorded against one reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceState {
    pub reserve_count: u32,
    pub release_count: u32,
    pub reserved_amount: i64,
    pub released_amount: i64,
    pub charged: bool,
}

impl ReferenceState {
    /// Folds the entries of a single reference.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        entries
            .into_iter()
            .fold(Self::default(), |mut state, entry| {
                match entry.entry_type {
                    EntryType::Reserve => {
                        state.reserve_count += 1;
                        state.reserved_amount = state.reserved_amount.saturating_add(entry.amount);
                    }
                    EntryType::Release => {
                        state.release_count += 1;
                        state.released_amount = state.released_amount.saturating_add(entry.amount);
                    }
                    EntryType::Charge => state.charged = true,
                    EntryType::Topup => {}
                }
                state
            })
    }

    /// True when a reserve exists that has been neither released nor charged.
    pub fn has_outstanding_reserve(&self) -> bool {
        !self.charged && self.reserve_count > self.release_count
    }

    /// Amount still held by the reference.
    pub fn outstanding_amount(&self) -> i64 {
        self.reserved_amount.saturating_sub(self.released_amount)
    }
}
