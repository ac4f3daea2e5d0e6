//! HTTP adapter for the issuance lifecycle.
//!
//! # Endpoints
//!
//! - `POST /api/issuances` - Grant a reward (reserves budget)
//! - `GET /api/issuances/{id}` - Current state
//! - `POST /api/issuances/{id}/process` - Run the reward handler
//! - `POST /api/issuances/{id}/redeem` - Redeem, optionally with `{"code": ...}`
//! - `POST /api/issuances/{id}/cancel` - Cancel and release the hold
//!
//! The tenant comes from the `X-Tenant-Id` header.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{IssuanceApiError, IssuanceAppState};
pub use routes::{issuance_router, issuance_routes};
