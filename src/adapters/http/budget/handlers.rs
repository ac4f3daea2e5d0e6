//! HTTP handlers for budget endpoints.
//!
//! Thin wrappers over [`BudgetLedger`]: parse the request, call the ledger,
//! map `ErrorCode` to a status.

use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::{BudgetLedger, CreateBudgetCommand, TopupCommand};
use crate::domain::budget::LedgerError;
use crate::domain::foundation::{BudgetId, ErrorCode, TenantId};

use super::dto::{
    BudgetListResponse, BudgetResponse, CreateBudgetRequest, ErrorResponse, HealthResponse,
    LedgerQuery, LedgerResponse, ReconcileResponse, TopupRequest,
};

pub const TENANT_HEADER: &str = "X-Tenant-Id";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct BudgetAppState {
    pub ledger: Arc<BudgetLedger>,
}

impl BudgetAppState {
    pub fn new(ledger: Arc<BudgetLedger>) -> Self {
        Self { ledger }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Tenant Context
// ════════════════════════════════════════════════════════════════════════════════

/// Tenant taken from the `X-Tenant-Id` header.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: TenantId,
}

/// Rejection for a missing or malformed tenant header.
pub struct TenantRequired;

impl IntoResponse for TenantRequired {
    fn into_response(self) -> axum::response::Response {
        BudgetApiError::new(
            ErrorCode::TenantRequired,
            format!("{} header with a tenant UUID is required", TENANT_HEADER),
        )
        .into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = TenantRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let tenant_id = parts
                .headers
                .get(TENANT_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<TenantId>().ok())
                .ok_or(TenantRequired)?;

            Ok(TenantContext { tenant_id })
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/budgets
pub async fn create_budget(
    State(state): State<BudgetAppState>,
    tenant: TenantContext,
    Json(request): Json<CreateBudgetRequest>,
) -> Result<impl IntoResponse, BudgetApiError> {
    let budget = state
        .ledger
        .create_budget(CreateBudgetCommand {
            tenant_id: tenant.tenant_id,
            name: request.name,
            currency: request.currency,
            soft_cap: request.soft_cap,
            hard_cap: request.hard_cap,
            period: request.period,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(BudgetResponse::from(budget))))
}

/// GET /api/budgets
pub async fn list_budgets(
    State(state): State<BudgetAppState>,
    tenant: TenantContext,
) -> Result<Json<BudgetListResponse>, BudgetApiError> {
    let budgets = state.ledger.list_budgets(&tenant.tenant_id).await?;
    Ok(Json(BudgetListResponse {
        budgets: budgets.into_iter().map(BudgetResponse::from).collect(),
    }))
}

/// GET /api/budgets/:id
pub async fn get_budget(
    State(state): State<BudgetAppState>,
    tenant: TenantContext,
    Path(budget_id): Path<String>,
) -> Result<Json<BudgetResponse>, BudgetApiError> {
    let budget_id = parse_budget_id(&budget_id)?;
    let budget = state
        .ledger
        .get_budget(&tenant.tenant_id, &budget_id)
        .await?;
    Ok(Json(budget.into()))
}

/// POST /api/budgets/:id/topup
pub async fn topup_budget(
    State(state): State<BudgetAppState>,
    tenant: TenantContext,
    Path(budget_id): Path<String>,
    Json(request): Json<TopupRequest>,
) -> Result<Json<BudgetResponse>, BudgetApiError> {
    let budget_id = parse_budget_id(&budget_id)?;
    let budget = state
        .ledger
        .topup(TopupCommand {
            tenant_id: tenant.tenant_id,
            budget_id,
            amount: request.amount,
            currency: request.currency,
        })
        .await?;
    Ok(Json(budget.into()))
}

/// GET /api/budgets/:id/ledger?limit=
pub async fn list_ledger_entries(
    State(state): State<BudgetAppState>,
    tenant: TenantContext,
    Path(budget_id): Path<String>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<LedgerResponse>, BudgetApiError> {
    let budget_id = parse_budget_id(&budget_id)?;
    let entries = state
        .ledger
        .list_entries(&tenant.tenant_id, &budget_id, query.limit)
        .await?;
    Ok(Json(LedgerResponse {
        budget_id: budget_id.to_string(),
        entries,
    }))
}

/// GET /api/budgets/:id/reconcile
pub async fn reconcile_budget(
    State(state): State<BudgetAppState>,
    tenant: TenantContext,
    Path(budget_id): Path<String>,
) -> Result<Json<ReconcileResponse>, BudgetApiError> {
    let budget_id = parse_budget_id(&budget_id)?;
    let report = state
        .ledger
        .reconcile(&tenant.tenant_id, &budget_id)
        .await?;
    Ok(Json(report.into()))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn parse_budget_id(raw: &str) -> Result<BudgetId, BudgetApiError> {
    raw.parse().map_err(|_| {
        BudgetApiError::new(
            ErrorCode::ValidationFailed,
            format!("Invalid budget ID format: {}", raw),
        )
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error carrying a stable code and message.
#[derive(Debug)]
pub struct BudgetApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl BudgetApiError {
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

/// HTTP status for an error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::BudgetNotFound
        | ErrorCode::IssuanceNotFound
        | ErrorCode::RewardNotFound
        | ErrorCode::WebhookNotFound
        | ErrorCode::ConnectorNotFound => StatusCode::NOT_FOUND,

        ErrorCode::InsufficientFunds
        | ErrorCode::AlreadyCharged
        | ErrorCode::NoReservation
        | ErrorCode::InvalidStateTransition
        | ErrorCode::IssuanceNotProcessable
        | ErrorCode::IssuanceExpired
        | ErrorCode::NoInventory => StatusCode::CONFLICT,

        ErrorCode::ValidationFailed
        | ErrorCode::InvalidAmount
        | ErrorCode::CurrencyMismatch
        | ErrorCode::UnknownRewardType
        | ErrorCode::InvalidRewardConfig
        | ErrorCode::InvalidRedemptionCode => StatusCode::UNPROCESSABLE_ENTITY,

        ErrorCode::TenantRequired => StatusCode::BAD_REQUEST,

        ErrorCode::SupplierError
        | ErrorCode::CircuitOpen
        | ErrorCode::RetriesExhausted
        | ErrorCode::Cancelled
        | ErrorCode::DatabaseError
        | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LedgerError> for BudgetApiError {
    fn from(err: LedgerError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl IntoResponse for BudgetApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.code, error = %self.message, "Budget API request failed");
        }
        let body = ErrorResponse::new(self.code, self.message);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Currency, DomainError};

    #[test]
    fn insufficient_funds_is_conflict() {
        let err: BudgetApiError = LedgerError::InsufficientFunds {
            requested: 10,
            available: 5,
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn currency_mismatch_is_unprocessable() {
        let err: BudgetApiError = LedgerError::CurrencyMismatch {
            expected: Currency::Usd,
            actual: Currency::Kes,
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, ErrorCode::CurrencyMismatch);
    }

    #[test]
    fn missing_budget_is_not_found() {
        let err: BudgetApiError = LedgerError::BudgetNotFound(BudgetId::new()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn storage_failure_is_internal() {
        let err: BudgetApiError = LedgerError::from(DomainError::database("down")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn tenant_required_is_bad_request() {
        assert_eq!(status_for(ErrorCode::TenantRequired), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_budget_id_is_validation_failure() {
        let err = parse_budget_id("not-a-uuid").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
