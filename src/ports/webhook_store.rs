//! Webhook store port - endpoint configuration and delivery audit log.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, TenantId, WebhookId};
use crate::domain::webhook::{EventType, Webhook, WebhookDeliveryAttempt};

#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn save_webhook(&self, webhook: &Webhook) -> Result<(), DomainError>;

    async fn find_webhook(&self, id: &WebhookId) -> Result<Option<Webhook>, DomainError>;

    /// Active webhooks of a tenant subscribed to `event`.
    async fn list_subscribed(
        &self,
        tenant_id: &TenantId,
        event: EventType,
    ) -> Result<Vec<Webhook>, DomainError>;

    /// Appends one attempt record. Records are never updated.
    async fn record_attempt(&self, attempt: &WebhookDeliveryAttempt) -> Result<(), DomainError>;

    /// Attempts of one webhook, oldest first.
    async fn list_attempts(
        &self,
        webhook_id: &WebhookId,
    ) -> Result<Vec<WebhookDeliveryAttempt>, DomainError>;
}
