//! Reward handler defaults and external voucher suppliers

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::suppliers::HttpConnectorConfig;
use crate::application::HandlerDefaults;

#[derive(Debug, Clone, Deserialize)]
pub struct RewardsConfig {
    #[serde(default = "default_discount_valid_days")]
    pub discount_valid_days: i64,

    #[serde(default = "default_physical_collection_days")]
    pub physical_collection_days: i64,

    #[serde(default = "default_discount_code_length")]
    pub discount_code_length: usize,

    #[serde(default = "default_claim_token_length")]
    pub claim_token_length: usize,

    /// Voucher suppliers keyed by the name catalog entries refer to.
    ///
    /// `LOYALTY_CORE__REWARDS__SUPPLIERS__ACME__BASE_URL=https://...`
    #[serde(default)]
    pub suppliers: HashMap<String, SupplierConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplierConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub signing_secret: Secret<String>,
    #[serde(default = "default_supplier_timeout")]
    pub timeout_secs: u64,
}

impl SupplierConfig {
    pub fn connector_config(&self) -> HttpConnectorConfig {
        HttpConnectorConfig::new(
            self.base_url.clone(),
            self.api_key.expose_secret().clone(),
            self.signing_secret.expose_secret().clone(),
        )
        .with_timeout(Duration::from_secs(self.timeout_secs))
    }

    fn validate(&self, name: &str) -> Result<(), ValidationError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidSupplierUrl(name.to_string()));
        }
        if self.api_key.expose_secret().is_empty()
            || self.signing_secret.expose_secret().is_empty()
        {
            return Err(ValidationError::MissingSupplierCredentials(
                name.to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::MustBePositive {
                field: "rewards.suppliers.timeout_secs",
            });
        }
        Ok(())
    }
}

impl RewardsConfig {
    pub fn handler_defaults(&self) -> HandlerDefaults {
        HandlerDefaults {
            discount_valid_days: self.discount_valid_days,
            physical_collection_days: self.physical_collection_days,
            discount_code_length: self.discount_code_length,
            claim_token_length: self.claim_token_length,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.discount_valid_days <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "rewards.discount_valid_days",
            });
        }
        if self.physical_collection_days <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "rewards.physical_collection_days",
            });
        }
        if !(4..=32).contains(&self.discount_code_length) {
            return Err(ValidationError::OutOfRange {
                field: "rewards.discount_code_length",
                min: 4,
                max: 32,
            });
        }
        if !(4..=32).contains(&self.claim_token_length) {
            return Err(ValidationError::OutOfRange {
                field: "rewards.claim_token_length",
                min: 4,
                max: 32,
            });
        }
        for (name, supplier) in &self.suppliers {
            supplier.validate(name)?;
        }
        Ok(())
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            discount_valid_days: default_discount_valid_days(),
            physical_collection_days: default_physical_collection_days(),
            discount_code_length: default_discount_code_length(),
            claim_token_length: default_claim_token_length(),
            suppliers: HashMap::new(),
        }
    }
}

fn default_discount_valid_days() -> i64 {
    30
}

fn default_physical_collection_days() -> i64 {
    30
}

fn default_discount_code_length() -> usize {
    8
}

fn default_claim_token_length() -> usize {
    6
}

fn default_supplier_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplier(base_url: &str, api_key: &str) -> SupplierConfig {
        SupplierConfig {
            base_url: base_url.to_string(),
            api_key: Secret::new(api_key.to_string()),
            signing_secret: Secret::new("whsec".to_string()),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_defaults_match_handler_defaults() {
        assert_eq!(
            RewardsConfig::default().handler_defaults(),
            HandlerDefaults::default()
        );
    }

    #[test]
    fn test_supplier_connector_config() {
        let config = supplier("https://vouchers.example.com/", "key").connector_config();
        assert_eq!(config.base_url, "https://vouchers.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_supplier_requires_http_url() {
        let mut config = RewardsConfig::default();
        config
            .suppliers
            .insert("acme".to_string(), supplier("ftp://acme", "key"));
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidSupplierUrl("acme".to_string()))
        );
    }

    #[test]
    fn test_supplier_requires_credentials() {
        let mut config = RewardsConfig::default();
        config
            .suppliers
            .insert("acme".to_string(), supplier("https://acme", ""));
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingSupplierCredentials(
                "acme".to_string()
            ))
        );
    }
}
