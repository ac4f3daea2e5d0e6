//! Reward issuance lifecycle.
//!
//! # Module Structure
//!
//! - `status` - IssuanceStatus state machine
//! - `aggregate` - Issuance aggregate
//! - `errors` - IssuanceError

mod aggregate;
mod errors;
mod status;

pub use aggregate::{Issuance, NewIssuance};
pub use errors::IssuanceError;
pub use status::IssuanceStatus;
