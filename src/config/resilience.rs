//! Circuit breaker and retry configuration shared by supplier calls and
//! webhook deliveries.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::resilience::RetryPolicy;
use crate::ports::CircuitBreakerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl ResilienceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.circuit_breaker.validate()?;
        self.retry.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_secs: u64,

    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

impl CircuitBreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            success_threshold: self.success_threshold,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.failure_threshold == 0 {
            return Err(ValidationError::MustBePositive {
                field: "resilience.circuit_breaker.failure_threshold",
            });
        }
        if self.success_threshold == 0 {
            return Err(ValidationError::MustBePositive {
                field: "resilience.circuit_breaker.success_threshold",
            });
        }
        Ok(())
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout(),
            success_threshold: default_success_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::MustBePositive {
                field: "resilience.retry.max_attempts",
            });
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ValidationError::InvalidRetryDelays);
        }
        if self.multiplier < 1.0 {
            return Err(ValidationError::InvalidRetryMultiplier);
        }
        Ok(())
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> u64 {
    30
}

fn default_success_threshold() -> u32 {
    3
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_runtime_defaults() {
        let config = ResilienceConfig::default();
        assert_eq!(
            config.circuit_breaker.to_breaker_config(),
            CircuitBreakerConfig::default()
        );
        let policy = config.retry.to_policy();
        let runtime = RetryPolicy::default();
        assert_eq!(policy.max_attempts, runtime.max_attempts);
        assert_eq!(policy.initial_delay, runtime.initial_delay);
        assert_eq!(policy.max_delay, runtime.max_delay);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let retry = RetrySettings {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(
            retry.validate(),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_max_delay_below_initial_rejected() {
        let retry = RetrySettings {
            initial_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(retry.validate(), Err(ValidationError::InvalidRetryDelays));
    }

    #[test]
    fn test_shrinking_multiplier_rejected() {
        let retry = RetrySettings {
            multiplier: 0.5,
            ..Default::default()
        };
        assert_eq!(
            retry.validate(),
            Err(ValidationError::InvalidRetryMultiplier)
        );
    }
}
