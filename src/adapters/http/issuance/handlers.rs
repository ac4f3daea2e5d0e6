//! HTTP handlers for issuance endpoints.
//!
//! Every issuance is looked up under the caller's tenant first, so an id
//! from another tenant answers 404 exactly like an unknown one.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tokio_util::sync::CancellationToken;

use crate::adapters::http::budget::dto::ErrorResponse;
use crate::adapters::http::budget::handlers::status_for;
use crate::adapters::http::budget::TenantContext;
use crate::application::{GrantRewardCommand, IssuanceService};
use crate::domain::foundation::{ErrorCode, IssuanceId};
use crate::domain::issuance::{Issuance, IssuanceError};

use super::dto::{GrantResponse, GrantRewardRequest, IssuanceResponse, RedeemRequest};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct IssuanceAppState {
    pub service: Arc<IssuanceService>,
    /// Parent of every processing token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl IssuanceAppState {
    pub fn new(service: Arc<IssuanceService>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/issuances
pub async fn grant_reward(
    State(state): State<IssuanceAppState>,
    tenant: TenantContext,
    Json(request): Json<GrantRewardRequest>,
) -> Result<impl IntoResponse, IssuanceApiError> {
    let outcome = state
        .service
        .grant_reward(GrantRewardCommand {
            tenant_id: tenant.tenant_id,
            customer_id: request.customer_id,
            campaign_id: request.campaign_id,
            reward_id: request.reward_id,
            budget_id: request.budget_id,
            cost_amount: request.cost_amount,
            face_amount: request.face_amount,
            currency: request.currency,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(GrantResponse::from(outcome))))
}

/// GET /api/issuances/:id
pub async fn get_issuance(
    State(state): State<IssuanceAppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<IssuanceResponse>, IssuanceApiError> {
    let issuance = owned_issuance(&state, &tenant, &id).await?;
    Ok(Json(issuance.into()))
}

/// POST /api/issuances/:id/process
pub async fn process_issuance(
    State(state): State<IssuanceAppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<IssuanceResponse>, IssuanceApiError> {
    let issuance = owned_issuance(&state, &tenant, &id).await?;
    let cancel = state.shutdown.child_token();
    let processed = state.service.process_issuance(&issuance.id, &cancel).await?;
    Ok(Json(processed.into()))
}

/// POST /api/issuances/:id/redeem
pub async fn redeem_issuance(
    State(state): State<IssuanceAppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
    body: Option<Json<RedeemRequest>>,
) -> Result<Json<IssuanceResponse>, IssuanceApiError> {
    let issuance = owned_issuance(&state, &tenant, &id).await?;
    let Json(request) = body.unwrap_or_default();
    let redeemed = state
        .service
        .redeem_issuance(&issuance.id, request.code.as_deref())
        .await?;
    Ok(Json(redeemed.into()))
}

/// POST /api/issuances/:id/cancel
pub async fn cancel_issuance(
    State(state): State<IssuanceAppState>,
    tenant: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<IssuanceResponse>, IssuanceApiError> {
    let issuance = owned_issuance(&state, &tenant, &id).await?;
    let cancelled = state.service.cancel_issuance(&issuance.id).await?;
    Ok(Json(cancelled.into()))
}

async fn owned_issuance(
    state: &IssuanceAppState,
    tenant: &TenantContext,
    raw: &str,
) -> Result<Issuance, IssuanceApiError> {
    let id = parse_issuance_id(raw)?;
    let issuance = state.service.get_issuance(&id).await?;
    if issuance.tenant_id != tenant.tenant_id {
        return Err(IssuanceError::NotFound(id).into());
    }
    Ok(issuance)
}

fn parse_issuance_id(raw: &str) -> Result<IssuanceId, IssuanceApiError> {
    raw.parse().map_err(|_| {
        IssuanceApiError::new(
            ErrorCode::ValidationFailed,
            format!("Invalid issuance ID format: {}", raw),
        )
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct IssuanceApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl IssuanceApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.code)
    }
}

impl From<IssuanceError> for IssuanceApiError {
    fn from(err: IssuanceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl IntoResponse for IssuanceApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.code, error = %self.message, "Issuance API request failed");
        }
        (status, Json(ErrorResponse::new(self.code, self.message))).into_response()
    }
}
