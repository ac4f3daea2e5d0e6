//! Application configuration module
//!
//! Configuration is read from environment variables using the `config` and
//! `dotenvy` crates. Variables carry the `LOYALTY_CORE` prefix and nested
//! values are separated by double underscores. Every section has defaults,
//! so an empty environment yields a development setup on in-memory stores.
//!
//! # Example
//!
//! ```no_run
//! use loyalty_core::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod ledger;
mod resilience;
mod rewards;
mod server;
mod sweeper;
mod webhooks;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use ledger::LedgerConfig;
pub use resilience::{CircuitBreakerSettings, ResilienceConfig, RetrySettings};
pub use rewards::{RewardsConfig, SupplierConfig};
pub use server::{Environment, ServerConfig};
pub use sweeper::SweeperConfig;
pub use webhooks::WebhooksConfig;

use serde::Deserialize;

const ENV_PREFIX: &str = "LOYALTY_CORE";

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection; absent URL selects in-memory stores
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Budget alert thresholds
    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub resilience: ResilienceConfig,

    #[serde(default)]
    pub rewards: RewardsConfig,

    #[serde(default)]
    pub sweeper: SweeperConfig,

    #[serde(default)]
    pub webhooks: WebhooksConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `LOYALTY_CORE__*` variables:
    ///
    /// - `LOYALTY_CORE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `LOYALTY_CORE__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load and validate in one step
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found, section by section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.ledger.validate()?;
        self.resilience.validate()?;
        self.rewards.validate()?;
        self.sweeper.validate()?;
        self.webhooks.validate()?;
        if self.is_production() && self.database.url.is_none() {
            return Err(ValidationError::MissingRequired("database.url"));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "LOYALTY_CORE__DATABASE__URL",
        "LOYALTY_CORE__SERVER__PORT",
        "LOYALTY_CORE__SERVER__ENVIRONMENT",
        "LOYALTY_CORE__LEDGER__WARNING_PERCENT",
        "LOYALTY_CORE__WEBHOOKS__WORKER_COUNT",
        "LOYALTY_CORE__REWARDS__SUPPLIERS__ACME__BASE_URL",
        "LOYALTY_CORE__REWARDS__SUPPLIERS__ACME__API_KEY",
        "LOYALTY_CORE__REWARDS__SUPPLIERS__ACME__SIGNING_SECRET",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.database.url.is_none());
        assert_eq!(config.ledger.warning_percent, 80.0);
        assert_eq!(config.webhooks.queue_capacity, 1000);
        assert!(config.sweeper.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("LOYALTY_CORE__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("LOYALTY_CORE__SERVER__PORT", "3000");
        env::set_var("LOYALTY_CORE__LEDGER__WARNING_PERCENT", "70");
        env::set_var("LOYALTY_CORE__WEBHOOKS__WORKER_COUNT", "8");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgresql://test@localhost/test")
        );
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ledger.warning_percent, 70.0);
        assert_eq!(config.webhooks.worker_count, 8);
    }

    #[test]
    fn test_suppliers_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var(
            "LOYALTY_CORE__REWARDS__SUPPLIERS__ACME__BASE_URL",
            "https://acme.example.com",
        );
        env::set_var("LOYALTY_CORE__REWARDS__SUPPLIERS__ACME__API_KEY", "key");
        env::set_var("LOYALTY_CORE__REWARDS__SUPPLIERS__ACME__SIGNING_SECRET", "secret");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        let acme = config.rewards.suppliers.get("acme").unwrap();
        assert_eq!(acme.base_url, "https://acme.example.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_database() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("LOYALTY_CORE__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("database.url"))
        );
    }
}
