//! Request and response bodies for the budget API.

use serde::{Deserialize, Serialize};

use crate::domain::budget::{Budget, BudgetPeriod, LedgerEntry, ReconciliationReport};
use crate::domain::foundation::{Currency, ErrorCode, Timestamp};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBudgetRequest {
    pub name: String,
    pub currency: Currency,
    pub soft_cap: i64,
    pub hard_cap: i64,
    #[serde(default)]
    pub period: BudgetPeriod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopupRequest {
    pub amount: i64,
    pub currency: Currency,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<u32>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct BudgetResponse {
    pub id: String,
    pub name: String,
    pub currency: Currency,
    pub soft_cap: i64,
    pub hard_cap: i64,
    pub balance: i64,
    pub available: i64,
    pub utilization_percent: f64,
    pub soft_cap_exceeded: bool,
    pub period: BudgetPeriod,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Budget> for BudgetResponse {
    fn from(budget: Budget) -> Self {
        Self {
            id: budget.id.to_string(),
            available: budget.available(),
            utilization_percent: budget.utilization_percent(),
            soft_cap_exceeded: budget.is_soft_cap_exceeded(),
            name: budget.name,
            currency: budget.currency,
            soft_cap: budget.soft_cap,
            hard_cap: budget.hard_cap,
            balance: budget.balance,
            period: budget.period,
            created_at: budget.created_at,
            updated_at: budget.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetListResponse {
    pub budgets: Vec<BudgetResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerResponse {
    pub budget_id: String,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResponse {
    pub balanced: bool,
    #[serde(flatten)]
    pub report: ReconciliationReport,
}

impl From<ReconciliationReport> for ReconcileResponse {
    fn from(report: ReconciliationReport) -> Self {
        Self {
            balanced: report.is_balanced(),
            report,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
