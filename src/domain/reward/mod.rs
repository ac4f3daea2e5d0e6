//! Reward catalog, handler results and code pools.
//!
//! # Module Structure
//!
//! - `catalog` - Reward entries, RewardType, per-type config shapes
//! - `voucher_code` - Pooled voucher code rows
//! - `codes` - Random code and token generation
//! - `errors` - RewardError

mod catalog;
pub mod codes;
mod errors;
mod voucher_code;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

pub use catalog::{
    expiry_after, window_days, DiscountConfig, DiscountKind, ExternalVoucherConfig,
    PhysicalItemConfig, PointsConfig, Reward, RewardType, WebhookCustomConfig, MAX_WINDOW_DAYS,
};
pub use errors::RewardError;
pub use voucher_code::{VoucherCode, VoucherCodeStatus};

/// Artifact produced by a reward handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub code: Option<String>,
    pub external_ref: Option<String>,
    pub expires_at: Option<Timestamp>,
    pub metadata: serde_json::Value,
}
