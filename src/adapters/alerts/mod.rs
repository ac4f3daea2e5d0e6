//! Alert sink adapters.
//!
//! - `TracingAlertSink` - structured log lines (default channel)
//! - `EventAlertSink` - republishes alerts as `budget.threshold_crossed` events
//! - `CompositeAlertSink` - fans an alert out to several sinks
//! - `RecordingAlertSink` - captures alerts for tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::domain::budget::{AlertSeverity, BudgetAlert};
use crate::domain::foundation::DomainError;
use crate::domain::webhook::EventEnvelope;
use crate::ports::{AlertSink, EventSink};

/// Writes alerts to the log with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn send(&self, alert: &BudgetAlert) -> Result<(), DomainError> {
        match alert.severity {
            AlertSeverity::Warning => tracing::warn!(
                alert_type = alert.alert_type.as_str(),
                tenant_id = %alert.tenant_id,
                budget_id = %alert.budget_id,
                balance = alert.balance,
                hard_cap = alert.hard_cap,
                utilization = alert.utilization_percent,
                "{}",
                alert.message
            ),
            AlertSeverity::Critical => tracing::error!(
                alert_type = alert.alert_type.as_str(),
                tenant_id = %alert.tenant_id,
                budget_id = %alert.budget_id,
                balance = alert.balance,
                hard_cap = alert.hard_cap,
                utilization = alert.utilization_percent,
                "{}",
                alert.message
            ),
        }
        Ok(())
    }
}

/// Turns alerts into `budget.threshold_crossed` domain events.
pub struct EventAlertSink {
    events: Arc<dyn EventSink>,
}

impl EventAlertSink {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl AlertSink for EventAlertSink {
    async fn send(&self, alert: &BudgetAlert) -> Result<(), DomainError> {
        self.events
            .publish(EventEnvelope::budget_threshold_crossed(alert))
            .await
            .map_err(DomainError::from)
    }
}

/// Delivers to every inner sink. Reports the first failure after trying all.
#[derive(Default)]
pub struct CompositeAlertSink {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl CompositeAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AlertSink for CompositeAlertSink {
    async fn send(&self, alert: &BudgetAlert) -> Result<(), DomainError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.send(alert).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Captures alerts for assertions. Can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingAlertSink {
    alerts: Arc<Mutex<Vec<BudgetAlert>>>,
    fail_with: Arc<Mutex<Option<DomainError>>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later `send` records the alert and then fails with `error`.
    pub fn fail_with(&self, error: DomainError) {
        *self.fail_with.lock().unwrap_or_else(|p| p.into_inner()) = Some(error);
    }

    pub fn alerts(&self) -> Vec<BudgetAlert> {
        self.alerts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn send(&self, alert: &BudgetAlert) -> Result<(), DomainError> {
        self.alerts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(alert.clone());
        match self.fail_with.lock().unwrap_or_else(|p| p.into_inner()).clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
