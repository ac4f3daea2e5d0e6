//! Currency codes and minor-unit amounts.
//!
//! All monetary values are `i64` minor units (cents). Floats are only used
//! for derived ratios such as utilization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Supported budget currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Kes,
}

impl Currency {
    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Kes => "KES",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "KES" => Ok(Currency::Kes),
            other => Err(ValidationError::invalid_format(
                "currency",
                format!("unsupported currency '{}'", other),
            )),
        }
    }
}

/// Validates that an amount is strictly positive.
pub fn ensure_positive(field: &str, amount: i64) -> Result<i64, ValidationError> {
    if amount <= 0 {
        return Err(ValidationError::invalid_format(
            field,
            format!("must be greater than zero, got {}", amount),
        ));
    }
    Ok(amount)
}
