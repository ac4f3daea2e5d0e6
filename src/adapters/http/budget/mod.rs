//! HTTP adapter for the budget ledger.
//!
//! # Endpoints
//!
//! - `POST /api/budgets` - Create a budget
//! - `GET /api/budgets` - List budgets
//! - `GET /api/budgets/{id}` - Budget with utilization
//! - `POST /api/budgets/{id}/topup` - Top up
//! - `GET /api/budgets/{id}/ledger` - Ledger entries, newest first
//! - `GET /api/budgets/{id}/reconcile` - Reconciliation report
//! - `GET /health` - Liveness probe
//!
//! The tenant comes from the `X-Tenant-Id` header.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{BudgetAppState, TenantContext, TENANT_HEADER};
pub use routes::{budget_router, budget_routes};
