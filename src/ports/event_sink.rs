//! Event sink port - fire-and-forget hand-off of domain events.
//!
//! Called after the producing transaction has committed. Implementations must
//! not block on delivery.

use async_trait::async_trait;

use crate::domain::webhook::{EventEnvelope, WebhookError};

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: EventEnvelope) -> Result<(), WebhookError>;
}
