//! Expiry sweeper configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::SweeperSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Issuances examined per sweep
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,
}

impl SweeperConfig {
    pub fn settings(&self) -> SweeperSettings {
        SweeperSettings {
            interval: Duration::from_secs(self.interval_secs),
            batch_limit: self.batch_limit,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::MustBePositive {
                field: "sweeper.interval_secs",
            });
        }
        if self.batch_limit == 0 || self.batch_limit > 10_000 {
            return Err(ValidationError::OutOfRange {
                field: "sweeper.batch_limit",
                min: 1,
                max: 10_000,
            });
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            batch_limit: default_batch_limit(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    60
}

fn default_batch_limit() -> u32 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_defaults() {
        let settings = SweeperConfig::default().settings();
        assert_eq!(settings.interval, Duration::from_secs(60));
        assert_eq!(settings.batch_limit, 500);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let config = SweeperConfig {
            batch_limit: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }
}
