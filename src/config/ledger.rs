//! Budget ledger configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::budget::AlertThresholds;

/// Utilization thresholds for budget alerts, in percent.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_warning_percent")]
    pub warning_percent: f64,

    #[serde(default = "default_critical_percent")]
    pub critical_percent: f64,
}

impl LedgerConfig {
    pub fn alert_thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            warning_percent: self.warning_percent,
            critical_percent: self.critical_percent,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let ordered = self.warning_percent > 0.0
            && self.warning_percent < self.critical_percent
            && self.critical_percent <= 100.0;
        if !ordered {
            return Err(ValidationError::InvalidAlertThresholds);
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            warning_percent: default_warning_percent(),
            critical_percent: default_critical_percent(),
        }
    }
}

fn default_warning_percent() -> f64 {
    80.0
}

fn default_critical_percent() -> f64 {
    95.0
}
