//! Surveillance Governance - audit trail, decision ledger and field redaction
//! for epidemiological surveillance pipelines.

pub mod archive;
pub mod audit;
pub mod config;
pub mod governance;
pub mod guardrail;
pub mod redact;
pub mod tokens;

pub use governance::{Governance, MetricsReview};
