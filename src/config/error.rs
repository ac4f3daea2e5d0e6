//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address {0}")]
    InvalidBindAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Alert thresholds must satisfy 0 < warning < critical <= 100")]
    InvalidAlertThresholds,

    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("Retry max_delay must not be shorter than initial_delay")]
    InvalidRetryDelays,

    #[error("Retry multiplier must be at least 1.0")]
    InvalidRetryMultiplier,

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
    },

    #[error("Supplier {0} base_url must be http(s)")]
    InvalidSupplierUrl(String),

    #[error("Supplier {0} is missing credentials")]
    MissingSupplierCredentials(String),
}
