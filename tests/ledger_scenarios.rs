//! End-to-end budget ledger scenarios against the in-memory store.
//!
//! Covers reserve, charge, release and topup through `BudgetLedger`, the
//! alerts raised along the way, and reconciliation of the stored balance
//! against the append-only ledger.

use std::sync::Arc;

use loyalty_core::adapters::{InMemoryRewardsStore, RecordingAlertSink};
use loyalty_core::application::{BudgetLedger, CreateBudgetCommand, LedgerCommand, TopupCommand};
use loyalty_core::domain::budget::{
    AlertThresholds, AlertType, Budget, BudgetPeriod, EntryType, LedgerError, LedgerRef,
};
use loyalty_core::domain::foundation::{Currency, ErrorCode, TenantId};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Harness {
    store: InMemoryRewardsStore,
    alerts: RecordingAlertSink,
    ledger: BudgetLedger,
    tenant: TenantId,
}

fn harness() -> Harness {
    let store = InMemoryRewardsStore::new();
    let alerts = RecordingAlertSink::new();
    let ledger = BudgetLedger::new(
        Arc::new(store.clone()),
        Arc::new(alerts.clone()),
        AlertThresholds::default(),
    );
    Harness {
        store,
        alerts,
        ledger,
        tenant: TenantId::new(),
    }
}

async fn budget(h: &Harness, soft_cap: i64, hard_cap: i64) -> Budget {
    h.ledger
        .create_budget(CreateBudgetCommand {
            tenant_id: h.tenant,
            name: "Campaign budget".to_string(),
            currency: Currency::Usd,
            soft_cap,
            hard_cap,
            period: BudgetPeriod::Rolling,
        })
        .await
        .unwrap()
}

fn cmd(h: &Harness, budget: &Budget, amount: i64, reference: &str) -> LedgerCommand {
    LedgerCommand {
        tenant_id: h.tenant,
        budget_id: budget.id,
        amount,
        currency: Currency::Usd,
        reference: LedgerRef::new("issuance", reference),
    }
}

async fn balance(h: &Harness, budget: &Budget) -> i64 {
    h.ledger
        .get_budget(&h.tenant, &budget.id)
        .await
        .unwrap()
        .balance
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn reserve_within_soft_cap() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;

    let reservation = h.ledger.reserve(cmd(&h, &b, 1_000, "a")).await.unwrap();

    assert_eq!(reservation.new_balance, 1_000);
    assert!((reservation.utilization_percent - 10.0).abs() < f64::EPSILON);
    assert!(!reservation.soft_cap_exceeded);
    assert!(h.alerts.alerts().is_empty());
}

#[tokio::test]
async fn reserve_past_hard_cap_is_rejected_without_side_effects() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;
    h.ledger.reserve(cmd(&h, &b, 9_500, "first")).await.unwrap();
    let entries_before = h.store.all_ledger_entries(&b.id).await.len();

    let err = h.ledger.reserve(cmd(&h, &b, 1_000, "second")).await.unwrap_err();

    assert_eq!(
        err,
        LedgerError::InsufficientFunds {
            requested: 1_000,
            available: 500
        }
    );
    assert_eq!(balance(&h, &b).await, 9_500);
    assert_eq!(h.store.all_ledger_entries(&b.id).await.len(), entries_before);
    let last = h.alerts.alerts().pop().unwrap();
    assert_eq!(last.alert_type, AlertType::HardCapReached);
}

#[tokio::test]
async fn reserve_past_soft_cap_succeeds_and_flags_it() {
    let h = harness();
    let b = budget(&h, 5_000, 10_000).await;

    let reservation = h.ledger.reserve(cmd(&h, &b, 6_000, "big")).await.unwrap();

    assert!(reservation.soft_cap_exceeded);
    assert_eq!(reservation.new_balance, 6_000);
}

#[tokio::test]
async fn charge_succeeds_once_per_reference() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;
    h.ledger.reserve(cmd(&h, &b, 1_000, "iss-1")).await.unwrap();

    h.ledger.charge(cmd(&h, &b, 1_000, "iss-1")).await.unwrap();
    let err = h.ledger.charge(cmd(&h, &b, 1_000, "iss-1")).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::AlreadyCharged);
    assert_eq!(balance(&h, &b).await, 1_000);
}

#[tokio::test]
async fn release_returns_headroom_and_blocks_later_charge() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;
    h.ledger.reserve(cmd(&h, &b, 2_000, "iss-2")).await.unwrap();

    h.ledger.release(cmd(&h, &b, 2_000, "iss-2")).await.unwrap();

    assert_eq!(balance(&h, &b).await, 0);
    let err = h.ledger.charge(cmd(&h, &b, 2_000, "iss-2")).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoReservation);
}

#[tokio::test]
async fn charge_without_reservation_is_rejected() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;

    let err = h.ledger.charge(cmd(&h, &b, 500, "ghost")).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::NoReservation);
    assert!(h.store.all_ledger_entries(&b.id).await.is_empty());
}

#[tokio::test]
async fn currency_mismatch_is_rejected() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;
    let mut kes = cmd(&h, &b, 100, "kes");
    kes.currency = Currency::Kes;

    let err = h.ledger.reserve(kes).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::CurrencyMismatch);
    assert_eq!(balance(&h, &b).await, 0);
}

#[tokio::test]
async fn soft_then_hard_threshold_alerts_fire_once_each() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;

    h.ledger.reserve(cmd(&h, &b, 7_000, "a")).await.unwrap();
    h.ledger.reserve(cmd(&h, &b, 1_500, "b")).await.unwrap();
    h.ledger.reserve(cmd(&h, &b, 1_000, "c")).await.unwrap();
    h.ledger.reserve(cmd(&h, &b, 100, "d")).await.unwrap();

    let types: Vec<_> = h.alerts.alerts().iter().map(|a| a.alert_type).collect();
    assert_eq!(types, vec![AlertType::SoftCap, AlertType::HardCap]);
}

#[tokio::test]
async fn topup_adds_headroom_for_rejected_reservation() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;
    h.ledger.reserve(cmd(&h, &b, 9_500, "first")).await.unwrap();
    assert!(h.ledger.reserve(cmd(&h, &b, 1_000, "second")).await.is_err());

    h.ledger
        .topup(TopupCommand {
            tenant_id: h.tenant,
            budget_id: b.id,
            amount: 1_000,
            currency: Currency::Usd,
        })
        .await
        .unwrap();

    let reservation = h.ledger.reserve(cmd(&h, &b, 1_000, "second")).await.unwrap();
    assert_eq!(reservation.new_balance, 9_500);
}

#[tokio::test]
async fn reconcile_matches_after_mixed_operations() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;
    h.ledger.reserve(cmd(&h, &b, 1_000, "r1")).await.unwrap();
    h.ledger.reserve(cmd(&h, &b, 2_000, "r2")).await.unwrap();
    h.ledger.charge(cmd(&h, &b, 1_000, "r1")).await.unwrap();
    h.ledger.release(cmd(&h, &b, 2_000, "r2")).await.unwrap();

    let report = h.ledger.reconcile(&h.tenant, &b.id).await.unwrap();

    assert!(report.is_balanced());
    assert_eq!(report.stored_balance, 1_000);
    assert_eq!(report.entry_count, 4);
}

#[tokio::test]
async fn reconcile_reports_drift_without_fixing_it() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;
    h.ledger.reserve(cmd(&h, &b, 1_000, "r1")).await.unwrap();
    h.store.force_balance(&b.id, 1_250).await;

    let report = h.ledger.reconcile(&h.tenant, &b.id).await.unwrap();

    assert!(!report.is_balanced());
    assert_eq!(report.expected_balance, 1_000);
    assert_eq!(report.discrepancy, 250);
    assert_eq!(balance(&h, &b).await, 1_250);
}

#[tokio::test]
async fn ledger_lists_newest_first() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;
    h.ledger.reserve(cmd(&h, &b, 1_000, "r1")).await.unwrap();
    h.ledger.charge(cmd(&h, &b, 1_000, "r1")).await.unwrap();

    let entries = h.ledger.list_entries(&h.tenant, &b.id, None).await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entry_type, EntryType::Charge);
    assert_eq!(entries[1].entry_type, EntryType::Reserve);
}

#[tokio::test]
async fn reserve_of_max_amount_leaves_budget_untouched() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;
    h.ledger.reserve(cmd(&h, &b, 1_000, "small")).await.unwrap();

    let err = h
        .ledger
        .reserve(cmd(&h, &b, i64::MAX, "huge"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InsufficientFunds);
    assert_eq!(balance(&h, &b).await, 1_000);
    assert_eq!(h.store.all_ledger_entries(&b.id).await.len(), 1);
    assert!(h.ledger.reconcile(&h.tenant, &b.id).await.unwrap().is_balanced());
}

#[tokio::test]
async fn repeated_max_topup_is_rejected_once_out_of_range() {
    let h = harness();
    let b = budget(&h, 8_000, 10_000).await;
    let topup = || TopupCommand {
        tenant_id: h.tenant,
        budget_id: b.id,
        amount: i64::MAX,
        currency: Currency::Usd,
    };

    h.ledger.topup(topup()).await.unwrap();
    let err = h.ledger.topup(topup()).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidAmount);
    assert_eq!(balance(&h, &b).await, -i64::MAX);
    assert_eq!(h.store.all_ledger_entries(&b.id).await.len(), 1);
    assert!(h.ledger.reconcile(&h.tenant, &b.id).await.unwrap().is_balanced());
}
