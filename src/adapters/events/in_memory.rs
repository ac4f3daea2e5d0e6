//! In-memory event sink for testing.
//!
//! Captures every published envelope so tests can assert on what the
//! services emitted after commit.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::domain::webhook::{EventEnvelope, EventType, WebhookError};
use crate::ports::EventSink;

#[derive(Clone, Default)]
pub struct RecordingEventSink {
    published: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn events_of_type(&self, event: EventType) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event == event)
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.published.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, event: EventEnvelope) -> Result<(), WebhookError> {
        self.published
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{CustomerId, TenantId};

    #[tokio::test]
    async fn captures_events_by_type() {
        let sink = RecordingEventSink::new();
        let tenant = TenantId::new();
        sink.publish(EventEnvelope::customer_enrolled(tenant, CustomerId::new()))
            .await
            .unwrap();

        assert_eq!(sink.event_count(), 1);
        assert_eq!(sink.events_of_type(EventType::CustomerEnrolled).len(), 1);
        assert!(sink.events_of_type(EventType::RewardIssued).is_empty());
    }
}
