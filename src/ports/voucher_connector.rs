//! Voucher connector port - outbound calls to external reward suppliers.
//!
//! Each supplier is registered under a name in the `ConnectorRegistry`, which
//! pairs it with its own circuit breaker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::Currency;

/// Request to issue one voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherRequest {
    pub product_id: String,
    /// Phone number or customer id the supplier delivers to.
    pub recipient: String,
    pub amount: i64,
    pub currency: Currency,
    /// Issuance id. Suppliers deduplicate retries on it.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherStatus {
    Success,
    Pending,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherResponse {
    #[serde(default)]
    pub voucher_code: Option<String>,
    pub transaction_id: String,
    pub status: VoucherStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Failures talking to a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Supplier request timed out")]
    Timeout,

    #[error("Supplier answered HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Supplier response could not be read: {0}")]
    InvalidResponse(String),

    #[error("Supplier rejected the request: {0}")]
    Rejected(String),

    #[error("Connector misconfigured: {0}")]
    Configuration(String),

    #[error("Circuit open for {0}")]
    CircuitOpen(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ConnectorError {
    /// Network failures, timeouts and 5xx/429/408 answers are worth retrying.
    pub fn is_retriable(&self) -> bool {
        match self {
            ConnectorError::Network(_) | ConnectorError::Timeout => true,
            ConnectorError::Http { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            ConnectorError::InvalidResponse(_)
            | ConnectorError::Rejected(_)
            | ConnectorError::Configuration(_)
            | ConnectorError::CircuitOpen(_)
            | ConnectorError::Cancelled => false,
        }
    }

    /// True for failures that say something about the supplier's health and
    /// therefore count against its circuit breaker.
    pub fn trips_breaker(&self) -> bool {
        self.is_retriable() || matches!(self, ConnectorError::InvalidResponse(_))
    }
}

/// Port for an external voucher supplier.
#[async_trait]
pub trait VoucherConnector: Send + Sync {
    /// Issues a voucher. Repeating a request with the same idempotency key
    /// must not issue a second voucher.
    async fn issue_voucher(&self, request: &VoucherRequest) -> Result<VoucherResponse, ConnectorError>;

    async fn check_status(&self, transaction_id: &str) -> Result<VoucherStatus, ConnectorError>;

    async fn cancel_voucher(&self, external_ref: &str) -> Result<(), ConnectorError>;
}
