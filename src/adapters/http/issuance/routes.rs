//! Route configuration for issuance endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    cancel_issuance, get_issuance, grant_reward, process_issuance, redeem_issuance,
    IssuanceAppState,
};

/// Issuance routes, relative to `/api/issuances`.
pub fn issuance_routes() -> Router<IssuanceAppState> {
    Router::new()
        .route("/", post(grant_reward))
        .route("/:id", get(get_issuance))
        .route("/:id/process", post(process_issuance))
        .route("/:id/redeem", post(redeem_issuance))
        .route("/:id/cancel", post(cancel_issuance))
}

/// Router serving the issuance API, ready to merge with the budget router.
pub fn issuance_router(state: IssuanceAppState) -> Router {
    Router::new()
        .nest("/api/issuances", issuance_routes())
        .with_state(state)
}
