//! Budget domain module.
//!
//! # Module Structure
//!
//! - `aggregate` - Budget aggregate and its ledger rules
//! - `ledger_entry` - Immutable ledger entries and per-reference state
//! - `alert` - Utilization alert records and thresholds
//! - `errors` - LedgerError

mod aggregate;
mod alert;
mod errors;
mod ledger_entry;

pub use aggregate::{Budget, BudgetPeriod, ReconciliationReport, Reservation};
pub use alert::{AlertSeverity, AlertThresholds, AlertType, BudgetAlert};
pub use errors::LedgerError;
pub use ledger_entry::{EntryType, LedgerEntry, LedgerRef, ReferenceState};
