//! Webhook delivery error types.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, WebhookId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("Webhook not found: {0}")]
    NotFound(WebhookId),

    #[error("Unknown event type: {0}")]
    UnknownEvent(String),

    #[error("Webhook signature does not match")]
    InvalidSignature,

    #[error("Webhook transport failed: {0}")]
    Transport(String),

    #[error("Webhook endpoint answered {status}")]
    Status { status: u16, body: String },

    #[error("Circuit open for {0}")]
    CircuitOpen(String),

    #[error("Delivery cancelled")]
    Cancelled,

    #[error("Failed to serialize webhook payload: {0}")]
    Serialization(String),

    #[error("Webhook queue is full")]
    QueueFull,

    #[error("Webhook dispatcher is shut down")]
    QueueClosed,

    #[error("Webhook workers did not stop within {0:?}")]
    ShutdownTimeout(std::time::Duration),

    #[error("Webhook storage failure: {0}")]
    Storage(DomainError),
}

impl WebhookError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WebhookError::NotFound(_) => ErrorCode::WebhookNotFound,
            WebhookError::UnknownEvent(_) | WebhookError::InvalidSignature => {
                ErrorCode::ValidationFailed
            }
            WebhookError::Transport(_) | WebhookError::Status { .. } => ErrorCode::SupplierError,
            WebhookError::CircuitOpen(_) => ErrorCode::CircuitOpen,
            WebhookError::Cancelled => ErrorCode::Cancelled,
            WebhookError::Serialization(_)
            | WebhookError::QueueFull
            | WebhookError::QueueClosed
            | WebhookError::ShutdownTimeout(_) => ErrorCode::InternalError,
            WebhookError::Storage(e) => e.code,
        }
    }

    /// True for failures worth another delivery attempt.
    pub fn is_retriable(&self) -> bool {
        match self {
            WebhookError::Transport(_) => true,
            WebhookError::Status { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            _ => false,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Storage(err)
    }
}

impl From<WebhookError> for DomainError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Storage(inner) => inner,
            other => DomainError::new(other.code(), other.to_string()),
        }
    }
}
