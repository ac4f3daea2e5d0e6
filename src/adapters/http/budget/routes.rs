//! Route configuration for budget endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    create_budget, get_budget, health, list_budgets, list_ledger_entries, reconcile_budget,
    topup_budget, BudgetAppState,
};

/// Budget routes, relative to `/api/budgets`.
///
/// - `POST /` - Create a budget
/// - `GET /` - List the tenant's budgets
/// - `GET /:id` - Budget with utilization
/// - `POST /:id/topup` - Add headroom
/// - `GET /:id/ledger?limit=` - Newest entries first
/// - `GET /:id/reconcile` - Compare balance with ledger
pub fn budget_routes() -> Router<BudgetAppState> {
    Router::new()
        .route("/", post(create_budget).get(list_budgets))
        .route("/:id", get(get_budget))
        .route("/:id/topup", post(topup_budget))
        .route("/:id/ledger", get(list_ledger_entries))
        .route("/:id/reconcile", get(reconcile_budget))
}

/// Complete router with the budget API and the liveness probe.
pub fn budget_router(state: BudgetAppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/budgets", budget_routes())
        .with_state(state)
}
