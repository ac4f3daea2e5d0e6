//! Budget utilization alerts.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{BudgetId, Currency, TenantId, Timestamp};

use super::Budget;

/// Which limit an alert refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Utilization crossed the warning threshold.
    SoftCap,
    /// Utilization crossed the critical threshold.
    HardCap,
    /// A reservation was rejected because the hard cap would be exceeded.
    HardCapReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertType {
    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertType::SoftCap => AlertSeverity::Warning,
            AlertType::HardCap | AlertType::HardCapReached => AlertSeverity::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::SoftCap => "soft_cap",
            AlertType::HardCap => "hard_cap",
            AlertType::HardCapReached => "hard_cap_reached",
        }
    }
}

/// Utilization percentages at which reservation alerts fire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub warning_percent: f64,
    pub critical_percent: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warning_percent: 80.0,
            critical_percent: 95.0,
        }
    }
}

impl AlertThresholds {
    /// Returns the most severe threshold crossed between two utilizations.
    ///
    /// Crossing means the previous value was below the threshold and the new
    /// one is at or above it.
    pub fn crossed(&self, previous_percent: f64, new_percent: f64) -> Option<AlertType> {
        let crossed = |threshold: f64| previous_percent < threshold && new_percent >= threshold;
        if crossed(self.critical_percent) {
            Some(AlertType::HardCap)
        } else if crossed(self.warning_percent) {
            Some(AlertType::SoftCap)
        } else {
            None
        }
    }
}

/// Structured alert record handed to the alert sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub tenant_id: TenantId,
    pub budget_id: BudgetId,
    pub budget_name: String,
    pub currency: Currency,
    pub balance: i64,
    pub soft_cap: i64,
    pub hard_cap: i64,
    pub utilization_percent: f64,
    pub message: String,
    pub raised_at: Timestamp,
}

impl BudgetAlert {
    /// Builds an alert describing the budget's current figures.
    pub fn for_budget(budget: &Budget, alert_type: AlertType) -> Self {
        let utilization = budget.utilization_percent();
        let message = match alert_type {
            AlertType::SoftCap => format!(
                "Budget '{}' is at {:.1}% of its hard cap",
                budget.name, utilization
            ),
            AlertType::HardCap => format!(
                "Budget '{}' is critically close to its hard cap ({:.1}%)",
                budget.name, utilization
            ),
            AlertType::HardCapReached => format!(
                "Budget '{}' rejected a reservation: hard cap of {} {} reached",
                budget.name, budget.hard_cap, budget.currency
            ),
        };

        Self {
            alert_type,
            severity: alert_type.severity(),
            tenant_id: budget.tenant_id,
            budget_id: budget.id,
            budget_name: budget.name.clone(),
            currency: budget.currency,
            balance: budget.balance,
            soft_cap: budget.soft_cap,
            hard_cap: budget.hard_cap,
            utilization_percent: utilization,
            message,
            raised_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_warning_threshold_raises_soft_cap() {
        let t = AlertThresholds::default();
        assert_eq!(t.crossed(70.0, 85.0), Some(AlertType::SoftCap));
    }

    #[test]
    fn crossing_both_thresholds_raises_only_the_critical_one() {
        let t = AlertThresholds::default();
        assert_eq!(t.crossed(10.0, 96.0), Some(AlertType::HardCap));
    }

    #[test]
    fn staying_above_a_threshold_does_not_repeat_the_alert() {
        let t = AlertThresholds::default();
        assert_eq!(t.crossed(85.0, 90.0), None);
        assert_eq!(t.crossed(96.0, 99.0), None);
    }

    #[test]
    fn landing_exactly_on_threshold_counts_as_crossing() {
        let t = AlertThresholds::default();
        assert_eq!(t.crossed(79.9, 80.0), Some(AlertType::SoftCap));
    }

    #[test]
    fn severities_match_alert_types() {
        assert_eq!(AlertType::SoftCap.severity(), AlertSeverity::Warning);
        assert_eq!(AlertType::HardCapReached.severity(), AlertSeverity::Critical);
    }
}
