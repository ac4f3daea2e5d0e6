//! PostgreSQL implementation of WebhookStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DeliveryAttemptId, DomainError, ErrorCode, TenantId, Timestamp, WebhookId,
};
use crate::domain::webhook::{EventType, Webhook, WebhookDeliveryAttempt};
use crate::ports::WebhookStore;

fn invalid_event(value: &str) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid event type in database: {}", value),
    )
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookRow {
    id: Uuid,
    tenant_id: Uuid,
    url: String,
    secret: String,
    events: Vec<String>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<WebhookRow> for Webhook {
    type Error = DomainError;

    fn try_from(row: WebhookRow) -> Result<Self, Self::Error> {
        let events = row
            .events
            .iter()
            .map(|e| e.parse::<EventType>().map_err(|_| invalid_event(e)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Webhook {
            id: WebhookId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            url: row.url,
            secret: row.secret,
            events,
            active: row.active,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    id: Uuid,
    webhook_id: Uuid,
    tenant_id: Uuid,
    event_type: String,
    attempt: i32,
    status: String,
    response_code: Option<i32>,
    response_body: Option<String>,
    error: Option<String>,
    duration_ms: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<AttemptRow> for WebhookDeliveryAttempt {
    type Error = DomainError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(WebhookDeliveryAttempt {
            id: DeliveryAttemptId::from_uuid(row.id),
            webhook_id: WebhookId::from_uuid(row.webhook_id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            event_type: row
                .event_type
                .parse()
                .map_err(|_| invalid_event(&row.event_type))?,
            attempt: row.attempt.max(0) as u32,
            status: row.status.parse()?,
            response_code: row.response_code.and_then(|c| u16::try_from(c).ok()),
            response_body: row.response_body,
            error: row.error,
            duration_ms: row.duration_ms.max(0) as u64,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

/// PostgreSQL implementation of the WebhookStore port.
#[derive(Clone)]
pub struct PostgresWebhookStore {
    pool: PgPool,
}

impl PostgresWebhookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookStore for PostgresWebhookStore {
    async fn save_webhook(&self, webhook: &Webhook) -> Result<(), DomainError> {
        let events: Vec<&str> = webhook.events.iter().map(|e| e.as_str()).collect();

        sqlx::query(
            r#"
            INSERT INTO webhooks (id, tenant_id, url, secret, events, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                url = EXCLUDED.url,
                secret = EXCLUDED.secret,
                events = EXCLUDED.events,
                active = EXCLUDED.active
            "#,
        )
        .bind(webhook.id.as_uuid())
        .bind(webhook.tenant_id.as_uuid())
        .bind(&webhook.url)
        .bind(&webhook.secret)
        .bind(&events)
        .bind(webhook.active)
        .bind(webhook.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to save webhook: {}", e),
            )
        })?;
        Ok(())
    }

    async fn find_webhook(&self, id: &WebhookId) -> Result<Option<Webhook>, DomainError> {
        let row: Option<WebhookRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, url, secret, events, active, created_at
            FROM webhooks
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to load webhook: {}", e),
            )
        })?;

        row.map(Webhook::try_from).transpose()
    }

    async fn list_subscribed(
        &self,
        tenant_id: &TenantId,
        event: EventType,
    ) -> Result<Vec<Webhook>, DomainError> {
        let rows: Vec<WebhookRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, url, secret, events, active, created_at
            FROM webhooks
            WHERE tenant_id = $1
              AND active
              AND (cardinality(events) = 0 OR $2 = ANY(events))
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(event.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list webhooks: {}", e),
            )
        })?;

        rows.into_iter().map(Webhook::try_from).collect()
    }

    async fn record_attempt(&self, attempt: &WebhookDeliveryAttempt) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_delivery_attempts (
                id, webhook_id, tenant_id, event_type, attempt, status, response_code,
                response_body, error, duration_ms, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(attempt.id.as_uuid())
        .bind(attempt.webhook_id.as_uuid())
        .bind(attempt.tenant_id.as_uuid())
        .bind(attempt.event_type.as_str())
        .bind(attempt.attempt as i32)
        .bind(attempt.status.as_str())
        .bind(attempt.response_code.map(i32::from))
        .bind(&attempt.response_body)
        .bind(&attempt.error)
        .bind(attempt.duration_ms as i64)
        .bind(attempt.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to record delivery attempt: {}", e),
            )
        })?;
        Ok(())
    }

    async fn list_attempts(
        &self,
        webhook_id: &WebhookId,
    ) -> Result<Vec<WebhookDeliveryAttempt>, DomainError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            r#"
            SELECT id, webhook_id, tenant_id, event_type, attempt, status, response_code,
                   response_body, error, duration_ms, created_at
            FROM webhook_delivery_attempts
            WHERE webhook_id = $1
            ORDER BY created_at, attempt
            "#,
        )
        .bind(webhook_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list delivery attempts: {}", e),
            )
        })?;

        rows.into_iter()
            .map(WebhookDeliveryAttempt::try_from)
            .collect()
    }
}
