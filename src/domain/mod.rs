//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, money, errors, state machine)
//! - `budget` - Budget aggregate, ledger entries, utilization alerts
//! - `issuance` - Issuance lifecycle state machine
//! - `reward` - Reward catalog, handler results, voucher code pools
//! - `webhook` - Event envelopes, webhook endpoints, signing

pub mod budget;
pub mod foundation;
pub mod issuance;
pub mod reward;
pub mod webhook;
