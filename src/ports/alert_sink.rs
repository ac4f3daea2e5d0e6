//! Alert sink port - destination for budget utilization alerts.
//!
//! Delivery failures are reported back to the caller, which logs them and
//! carries on. An alert never fails the ledger operation that raised it.

use async_trait::async_trait;

use crate::domain::budget::BudgetAlert;
use crate::domain::foundation::DomainError;

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &BudgetAlert) -> Result<(), DomainError>;
}
