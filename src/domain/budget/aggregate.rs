//! Budget aggregate entity.
//!
//! A Budget is a tenant-owned monetary envelope. Its `balance` is the amount
//! consumed toward `hard_cap`:
//!
//! | Entry | Balance effect |
//! |-------|----------------|
//! | reserve | `+amount` |
//! | charge | none, the hold becomes final |
//! | release | `-amount` |
//! | topup | `-amount`, headroom grows |
//!
//! The methods here decide whether an operation is allowed and produce the
//! ledger entry to append. Persisting both inside one locked transaction is
//! the caller's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    ensure_positive, BudgetId, Currency, DomainError, ErrorCode, TenantId, Timestamp,
    ValidationError,
};

use super::{EntryType, LedgerEntry, LedgerError, LedgerRef, ReferenceState};

/// Informational budget period. Not enforced by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    #[default]
    Rolling,
    Fixed,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetPeriod::Rolling => "rolling",
            BudgetPeriod::Fixed => "fixed",
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BudgetPeriod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rolling" => Ok(BudgetPeriod::Rolling),
            "fixed" => Ok(BudgetPeriod::Fixed),
            other => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Invalid budget period: {}", other),
            )),
        }
    }
}

/// Budget aggregate.
///
/// # Invariants
///
/// - `balance` equals the signed sum of the budget's ledger entries
/// - a reservation never pushes `balance` above `hard_cap`
/// - `0 < soft_cap <= hard_cap`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub tenant_id: TenantId,
    pub name: String,
    pub currency: Currency,
    pub soft_cap: i64,
    pub hard_cap: i64,
    pub balance: i64,
    pub period: BudgetPeriod,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Outcome of a successful reservation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reservation {
    pub amount: i64,
    pub new_balance: i64,
    pub utilization_percent: f64,
    pub previous_utilization_percent: f64,
    pub soft_cap_exceeded: bool,
}

/// Result of comparing the stored balance with the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub budget_id: BudgetId,
    pub stored_balance: i64,
    pub expected_balance: i64,
    pub discrepancy: i64,
    pub entry_count: usize,
    pub checked_at: Timestamp,
}

impl ReconciliationReport {
    pub fn is_balanced(&self) -> bool {
        self.discrepancy == 0
    }
}

impl Budget {
    /// Creates a new budget with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the name is blank, a cap is not positive, or
    /// the soft cap exceeds the hard cap.
    pub fn create(
        tenant_id: TenantId,
        name: impl Into<String>,
        currency: Currency,
        soft_cap: i64,
        hard_cap: i64,
        period: BudgetPeriod,
    ) -> Result<Self, LedgerError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::empty_field("name").into());
        }
        ensure_positive("soft_cap", soft_cap)?;
        ensure_positive("hard_cap", hard_cap)?;
        if soft_cap > hard_cap {
            return Err(ValidationError::out_of_range("soft_cap", 1, hard_cap, soft_cap).into());
        }

        let now = Timestamp::now();
        Ok(Self {
            id: BudgetId::new(),
            tenant_id,
            name: name.trim().to_string(),
            currency,
            soft_cap,
            hard_cap,
            balance: 0,
            period,
            created_at: now,
            updated_at: now,
        })
    }

    /// Headroom left before the hard cap.
    pub fn available(&self) -> i64 {
        self.hard_cap.saturating_sub(self.balance)
    }

    /// Balance as a percentage of the hard cap.
    pub fn utilization_percent(&self) -> f64 {
        utilization(self.balance, self.hard_cap)
    }

    pub fn is_soft_cap_exceeded(&self) -> bool {
        self.balance > self.soft_cap
    }

    /// Places a provisional hold against the budget.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount <= 0`
    /// - `CurrencyMismatch` if `currency` differs from the budget's
    /// - `InsufficientFunds` if the hold would exceed the hard cap or the
    ///   balance range; the budget is left untouched
    pub fn reserve(
        &mut self,
        amount: i64,
        currency: Currency,
        reference: LedgerRef,
    ) -> Result<(LedgerEntry, Reservation), LedgerError> {
        self.ensure_amount(amount)?;
        self.ensure_currency(currency)?;

        let previous = self.utilization_percent();
        let new_balance = match self.balance.checked_add(amount) {
            Some(balance) if balance <= self.hard_cap => balance,
            _ => {
                return Err(LedgerError::InsufficientFunds {
                    requested: amount,
                    available: self.available(),
                })
            }
        };

        let entry = self.entry(EntryType::Reserve, amount, Some(reference));
        self.apply(&entry)?;

        let reservation = Reservation {
            amount,
            new_balance,
            utilization_percent: self.utilization_percent(),
            previous_utilization_percent: previous,
            soft_cap_exceeded: self.is_soft_cap_exceeded(),
        };
        Ok((entry, reservation))
    }

    /// Finalizes an outstanding reservation.
    ///
    /// `state` must describe every entry already recorded for `reference`.
    pub fn charge(
        &mut self,
        amount: i64,
        currency: Currency,
        reference: LedgerRef,
        state: &ReferenceState,
    ) -> Result<LedgerEntry, LedgerError> {
        self.ensure_amount(amount)?;
        self.ensure_currency(currency)?;

        if state.charged {
            return Err(LedgerError::AlreadyCharged {
                reference: reference.to_string(),
            });
        }
        if !state.has_outstanding_reserve() {
            return Err(LedgerError::NoReservation {
                reference: reference.to_string(),
            });
        }
        if amount > state.outstanding_amount() {
            return Err(LedgerError::ExceedsReservation {
                reference: reference.to_string(),
                requested: amount,
                reserved: state.outstanding_amount(),
            });
        }

        let entry = self.entry(EntryType::Charge, amount, Some(reference));
        self.apply(&entry)?;
        Ok(entry)
    }

    /// Reverses an outstanding, uncharged reservation.
    pub fn release(
        &mut self,
        amount: i64,
        currency: Currency,
        reference: LedgerRef,
        state: &ReferenceState,
    ) -> Result<LedgerEntry, LedgerError> {
        self.ensure_amount(amount)?;
        self.ensure_currency(currency)?;

        if state.charged {
            return Err(LedgerError::AlreadyCharged {
                reference: reference.to_string(),
            });
        }
        if !state.has_outstanding_reserve() {
            return Err(LedgerError::NoReservation {
                reference: reference.to_string(),
            });
        }
        if amount > state.outstanding_amount() {
            return Err(LedgerError::ExceedsReservation {
                reference: reference.to_string(),
                requested: amount,
                reserved: state.outstanding_amount(),
            });
        }

        let entry = self.entry(EntryType::Release, amount, Some(reference));
        self.apply(&entry)?;
        Ok(entry)
    }

    /// Adds headroom to the budget.
    ///
    /// Returns `InvalidAmount` when the balance cannot absorb `amount`.
    pub fn topup(&mut self, amount: i64, currency: Currency) -> Result<LedgerEntry, LedgerError> {
        self.ensure_amount(amount)?;
        self.ensure_currency(currency)?;

        let entry = self.entry(EntryType::Topup, amount, None);
        self.apply(&entry)?;
        Ok(entry)
    }

    /// Compares the stored balance with the signed sum of `entries`.
    pub fn reconcile(&self, entries: &[LedgerEntry]) -> ReconciliationReport {
        // Partial sums in listing order may leave the i64 range.
        let expected: i128 = entries
            .iter()
            .filter(|e| e.budget_id == self.id)
            .map(|e| i128::from(e.signed_amount()))
            .sum();

        ReconciliationReport {
            budget_id: self.id,
            stored_balance: self.balance,
            expected_balance: saturate(expected),
            discrepancy: saturate(i128::from(self.balance) - expected),
            entry_count: entries.len(),
            checked_at: Timestamp::now(),
        }
    }

    fn ensure_amount(&self, amount: i64) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        Ok(())
    }

    fn ensure_currency(&self, currency: Currency) -> Result<(), LedgerError> {
        if currency != self.currency {
            return Err(LedgerError::CurrencyMismatch {
                expected: self.currency,
                actual: currency,
            });
        }
        Ok(())
    }

    fn entry(&self, entry_type: EntryType, amount: i64, reference: Option<LedgerRef>) -> LedgerEntry {
        LedgerEntry::new(
            self.tenant_id,
            self.id,
            entry_type,
            self.currency,
            amount,
            reference,
        )
    }

    fn apply(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_add(entry.signed_amount())
            .ok_or(LedgerError::InvalidAmount(entry.amount))?;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

fn utilization(balance: i64, hard_cap: i64) -> f64 {
    if hard_cap <= 0 {
        return 0.0;
    }
    balance as f64 / hard_cap as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(soft_cap: i64, hard_cap: i64) -> Budget {
        Budget::create(
            TenantId::new(),
            "Q3 rewards",
            Currency::Usd,
            soft_cap,
            hard_cap,
            BudgetPeriod::Rolling,
        )
        .unwrap()
    }

    fn reference() -> LedgerRef {
        LedgerRef::new("issuance", "ref-1")
    }

    // ============================================================
    // Creation
    // ============================================================

    #[test]
    fn create_rejects_soft_cap_above_hard_cap() {
        let result = Budget::create(
            TenantId::new(),
            "bad",
            Currency::Usd,
            200,
            100,
            BudgetPeriod::Fixed,
        );
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn create_rejects_blank_name() {
        let result = Budget::create(TenantId::new(), "  ", Currency::Usd, 1, 1, BudgetPeriod::Fixed);
        assert!(result.is_err());
    }

    // ============================================================
    // Reserve
    // ============================================================

    #[test]
    fn reserve_updates_balance_and_reports_utilization() {
        let mut b = budget(8000, 10000);
        let (entry, reservation) = b.reserve(1000, Currency::Usd, reference()).unwrap();

        assert_eq!(entry.entry_type, EntryType::Reserve);
        assert_eq!(reservation.new_balance, 1000);
        assert!((reservation.utilization_percent - 10.0).abs() < f64::EPSILON);
        assert!(!reservation.soft_cap_exceeded);
        assert_eq!(b.balance, 1000);
    }

    #[test]
    fn reserve_past_soft_cap_flags_it() {
        let mut b = budget(5000, 10000);
        let (_, reservation) = b.reserve(6000, Currency::Usd, reference()).unwrap();
        assert!(reservation.soft_cap_exceeded);
        assert_eq!(reservation.new_balance, 6000);
    }

    #[test]
    fn reserve_up_to_exact_hard_cap_is_allowed() {
        let mut b = budget(5000, 10000);
        assert!(b.reserve(10000, Currency::Usd, reference()).is_ok());
        assert_eq!(b.available(), 0);
    }

    #[test]
    fn reserve_over_hard_cap_leaves_balance_untouched() {
        let mut b = budget(8000, 10000);
        b.balance = 9500;
        let result = b.reserve(1000, Currency::Usd, reference());

        assert_eq!(
            result.unwrap_err(),
            LedgerError::InsufficientFunds {
                requested: 1000,
                available: 500
            }
        );
        assert_eq!(b.balance, 9500);
    }

    #[test]
    fn reserve_rejects_wrong_currency_and_bad_amount() {
        let mut b = budget(8000, 10000);
        assert!(matches!(
            b.reserve(10, Currency::Kes, reference()),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
        assert!(matches!(
            b.reserve(0, Currency::Usd, reference()),
            Err(LedgerError::InvalidAmount(0))
        ));
    }

    // ============================================================
    // Charge / Release
    // ============================================================

    #[test]
    fn charge_keeps_balance_and_requires_reservation() {
        let mut b = budget(8000, 10000);
        let empty = ReferenceState::default();
        assert!(matches!(
            b.charge(100, Currency::Usd, reference(), &empty),
            Err(LedgerError::NoReservation { .. })
        ));

        let (reserve, _) = b.reserve(100, Currency::Usd, reference()).unwrap();
        let state = ReferenceState::from_entries([&reserve]);
        let charge = b.charge(100, Currency::Usd, reference(), &state).unwrap();

        assert_eq!(charge.entry_type, EntryType::Charge);
        assert_eq!(b.balance, 100);

        let state = ReferenceState::from_entries([&reserve, &charge]);
        assert!(matches!(
            b.charge(100, Currency::Usd, reference(), &state),
            Err(LedgerError::AlreadyCharged { .. })
        ));
    }

    #[test]
    fn release_returns_funds_once() {
        let mut b = budget(8000, 10000);
        let (reserve, _) = b.reserve(400, Currency::Usd, reference()).unwrap();
        let state = ReferenceState::from_entries([&reserve]);
        let release = b.release(400, Currency::Usd, reference(), &state).unwrap();
        assert_eq!(b.balance, 0);

        let state = ReferenceState::from_entries([&reserve, &release]);
        assert!(matches!(
            b.release(400, Currency::Usd, reference(), &state),
            Err(LedgerError::NoReservation { .. })
        ));
    }

    #[test]
    fn release_after_charge_fails() {
        let mut b = budget(8000, 10000);
        let (reserve, _) = b.reserve(400, Currency::Usd, reference()).unwrap();
        let state = ReferenceState::from_entries([&reserve]);
        let charge = b.charge(400, Currency::Usd, reference(), &state).unwrap();
        let state = ReferenceState::from_entries([&reserve, &charge]);

        assert!(matches!(
            b.release(400, Currency::Usd, reference(), &state),
            Err(LedgerError::AlreadyCharged { .. })
        ));
        assert_eq!(b.balance, 400);
    }

    #[test]
    fn release_cannot_exceed_reserved_amount() {
        let mut b = budget(8000, 10000);
        let (reserve, _) = b.reserve(400, Currency::Usd, reference()).unwrap();
        let state = ReferenceState::from_entries([&reserve]);
        assert!(matches!(
            b.release(500, Currency::Usd, reference(), &state),
            Err(LedgerError::ExceedsReservation { .. })
        ));
    }

    // ============================================================
    // Topup / Reconcile
    // ============================================================

    #[test]
    fn topup_increases_headroom() {
        let mut b = budget(8000, 10000);
        b.reserve(9000, Currency::Usd, reference()).unwrap();
        b.topup(2000, Currency::Usd).unwrap();
        assert_eq!(b.balance, 7000);
        assert_eq!(b.available(), 3000);
    }

    #[test]
    fn reconcile_matches_applied_entries() {
        let mut b = budget(8000, 10000);
        let (r1, _) = b.reserve(1000, Currency::Usd, LedgerRef::new("issuance", "a")).unwrap();
        let (r2, _) = b.reserve(500, Currency::Usd, LedgerRef::new("issuance", "b")).unwrap();
        let rel = b
            .release(
                500,
                Currency::Usd,
                LedgerRef::new("issuance", "b"),
                &ReferenceState::from_entries([&r2]),
            )
            .unwrap();
        let top = b.topup(200, Currency::Usd).unwrap();

        let report = b.reconcile(&[r1, r2, rel, top]);
        assert!(report.is_balanced());
        assert_eq!(report.expected_balance, 800);
    }

    #[test]
    fn reconcile_surfaces_tampered_balance() {
        let mut b = budget(8000, 10000);
        let (r1, _) = b.reserve(1000, Currency::Usd, reference()).unwrap();
        b.balance = 1234;
        let report = b.reconcile(&[r1]);
        assert!(!report.is_balanced());
        assert_eq!(report.discrepancy, 234);
    }

    // ============================================================
    // Range limits
    // ============================================================

    #[test]
    fn reserve_of_max_amount_is_rejected_without_wrapping() {
        let mut b = budget(8000, 10000);
        b.reserve(1000, Currency::Usd, reference()).unwrap();

        let err = b
            .reserve(i64::MAX, Currency::Usd, LedgerRef::new("issuance", "huge"))
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                requested: i64::MAX,
                available: 9000
            }
        );
        assert_eq!(b.balance, 1000);
    }

    #[test]
    fn topup_beyond_balance_range_is_rejected() {
        let mut b = budget(8000, 10000);
        b.topup(i64::MAX, Currency::Usd).unwrap();
        assert_eq!(b.balance, -i64::MAX);
        assert_eq!(b.available(), i64::MAX);

        let err = b.topup(i64::MAX, Currency::Usd).unwrap_err();

        assert_eq!(err, LedgerError::InvalidAmount(i64::MAX));
        assert_eq!(err.code(), ErrorCode::InvalidAmount);
        assert_eq!(b.balance, -i64::MAX);
    }

    #[test]
    fn reserve_into_topped_up_headroom_stays_under_hard_cap() {
        let mut b = budget(8000, 10000);
        let top = b.topup(i64::MAX, Currency::Usd).unwrap();

        let (res, reservation) = b
            .reserve(i64::MAX, Currency::Usd, reference())
            .unwrap();
        let err = b
            .reserve(i64::MAX, Currency::Usd, LedgerRef::new("issuance", "again"))
            .unwrap_err();

        assert_eq!(reservation.new_balance, 0);
        assert_eq!(err.code(), ErrorCode::InsufficientFunds);
        assert!(b.balance <= b.hard_cap);
        assert!(b.reconcile(&[res, top]).is_balanced());
    }

    #[test]
    fn unknown_period_is_a_validation_error() {
        let err = "monthly".parse::<BudgetPeriod>().unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
