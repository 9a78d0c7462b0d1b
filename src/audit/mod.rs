//! Audit log and decision ledger.

mod error;
mod ledger;
mod logger;
mod types;

pub use error::AuditError;
pub use ledger::DecisionLedger;
pub use logger::AuditLog;
pub use types::{AuditEvent, RecordOutcome, Rotation, RotationMarker};
