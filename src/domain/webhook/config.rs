//! Tenant webhook endpoints and their delivery audit log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    DeliveryAttemptId, DomainError, ErrorCode, TenantId, Timestamp, WebhookId,
};

use super::EventType;

/// Longest response body kept on an attempt record.
pub const MAX_RESPONSE_BODY: usize = 1024;

/// A tenant-configured delivery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: WebhookId,
    pub tenant_id: TenantId,
    pub url: String,
    #[serde(skip_serializing)]
    pub secret: String,
    /// Subscribed event types. Empty means every event.
    pub events: Vec<EventType>,
    pub active: bool,
    pub created_at: Timestamp,
}

impl Webhook {
    pub fn new(
        tenant_id: TenantId,
        url: impl Into<String>,
        secret: impl Into<String>,
        events: Vec<EventType>,
    ) -> Self {
        Self {
            id: WebhookId::new(),
            tenant_id,
            url: url.into(),
            secret: secret.into(),
            events,
            active: true,
            created_at: Timestamp::now(),
        }
    }

    pub fn subscribes_to(&self, event: EventType) -> bool {
        self.events.is_empty() || self.events.contains(&event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Invalid delivery status: {}", other),
            )),
        }
    }
}

/// One delivery try. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDeliveryAttempt {
    pub id: DeliveryAttemptId,
    pub webhook_id: WebhookId,
    pub tenant_id: TenantId,
    pub event_type: EventType,
    pub attempt: u32,
    pub status: DeliveryStatus,
    pub response_code: Option<u16>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub created_at: Timestamp,
}

impl WebhookDeliveryAttempt {
    /// Builds an attempt record, truncating long response bodies.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        id: DeliveryAttemptId,
        webhook: &Webhook,
        event_type: EventType,
        attempt: u32,
        response_code: Option<u16>,
        response_body: Option<String>,
        error: Option<String>,
        duration_ms: u64,
    ) -> Self {
        let delivered = error.is_none() && response_code.is_some_and(|c| (200..300).contains(&c));
        Self {
            id,
            webhook_id: webhook.id,
            tenant_id: webhook.tenant_id,
            event_type,
            attempt,
            status: if delivered {
                DeliveryStatus::Delivered
            } else {
                DeliveryStatus::Failed
            },
            response_code,
            response_body: response_body.map(truncate_body),
            error,
            duration_ms,
            created_at: Timestamp::now(),
        }
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_RESPONSE_BODY {
        let mut cut = MAX_RESPONSE_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
