//! In-memory webhook store for testing and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, TenantId, WebhookId};
use crate::domain::webhook::{EventType, Webhook, WebhookDeliveryAttempt};
use crate::ports::WebhookStore;

#[derive(Debug, Clone, Default)]
pub struct InMemoryWebhookStore {
    webhooks: Arc<RwLock<HashMap<WebhookId, Webhook>>>,
    attempts: Arc<RwLock<Vec<WebhookDeliveryAttempt>>>,
}

impl InMemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded attempt across all webhooks. Test helper.
    pub async fn all_attempts(&self) -> Vec<WebhookDeliveryAttempt> {
        self.attempts.read().await.clone()
    }
}

#[async_trait]
impl WebhookStore for InMemoryWebhookStore {
    async fn save_webhook(&self, webhook: &Webhook) -> Result<(), DomainError> {
        self.webhooks
            .write()
            .await
            .insert(webhook.id, webhook.clone());
        Ok(())
    }

    async fn find_webhook(&self, id: &WebhookId) -> Result<Option<Webhook>, DomainError> {
        Ok(self.webhooks.read().await.get(id).cloned())
    }

    async fn list_subscribed(
        &self,
        tenant_id: &TenantId,
        event: EventType,
    ) -> Result<Vec<Webhook>, DomainError> {
        let webhooks = self.webhooks.read().await;
        let mut matching: Vec<Webhook> = webhooks
            .values()
            .filter(|w| w.tenant_id == *tenant_id && w.active && w.subscribes_to(event))
            .cloned()
            .collect();
        matching.sort_by_key(|w| w.created_at);
        Ok(matching)
    }

    async fn record_attempt(&self, attempt: &WebhookDeliveryAttempt) -> Result<(), DomainError> {
        self.attempts.write().await.push(attempt.clone());
        Ok(())
    }

    async fn list_attempts(
        &self,
        webhook_id: &WebhookId,
    ) -> Result<Vec<WebhookDeliveryAttempt>, DomainError> {
        Ok(self
            .attempts
            .read()
            .await
            .iter()
            .filter(|a| a.webhook_id == *webhook_id)
            .cloned()
            .collect())
    }
}
