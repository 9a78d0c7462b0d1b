//! Range and sign checks on computed surveillance metrics.
//!
//! Checks never fail: every problem, including values of the wrong type,
//! comes back as a [`Violation`]. Missing and `null` metrics are skipped.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Rate metrics that must be numeric and within `[-1.0, 1.0]`.
pub const RATE_FIELDS: [&str; 4] = [
    "mortality_rate_30d",
    "icu_rate_30d",
    "vaccination_rate",
    "case_increase_rate",
];

/// Count metrics that must be non-negative integers.
pub const COUNT_FIELDS: [&str; 2] = ["last7_cases", "prev7_cases"];

const RATE_MIN: f64 = -1.0;
const RATE_MAX: f64 = 1.0;

/// A single guardrail failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    NonNumeric { field: String, value: String },
    OutOfRange { field: String, value: f64 },
    NonInteger { field: String, value: String },
    Negative { field: String, value: i64 },
}

impl Violation {
    /// The metric that failed.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::NonNumeric { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::NonInteger { field, .. }
            | Self::Negative { field, .. } => field,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonNumeric { field, value } => {
                write!(f, "field {field} has non-numeric value: {value}")
            }
            Self::OutOfRange { field, value } => write!(
                f,
                "field {field} outside expected range [{RATE_MIN}, {RATE_MAX}]: {value}"
            ),
            Self::NonInteger { field, value } => {
                write!(f, "field {field} has non-integer value: {value}")
            }
            Self::Negative { field, value } => {
                write!(f, "field {field} has negative value: {value}")
            }
        }
    }
}

/// Check every known rate and count metric present in `metrics`.
#[must_use]
pub fn check_metrics(metrics: &Map<String, Value>) -> Vec<Violation> {
    let mut violations = Vec::new();

    for field in RATE_FIELDS {
        let Some(value) = present(metrics, field) else {
            continue;
        };
        match as_rate(value) {
            Some(rate) if (RATE_MIN..=RATE_MAX).contains(&rate) => {}
            Some(rate) => violations.push(Violation::OutOfRange {
                field: field.to_string(),
                value: rate,
            }),
            None => violations.push(Violation::NonNumeric {
                field: field.to_string(),
                value: display_value(value),
            }),
        }
    }

    for field in COUNT_FIELDS {
        let Some(value) = present(metrics, field) else {
            continue;
        };
        match as_count(value) {
            Some(count) if count >= 0 => {}
            Some(count) => violations.push(Violation::Negative {
                field: field.to_string(),
                value: count,
            }),
            None => violations.push(Violation::NonInteger {
                field: field.to_string(),
                value: display_value(value),
            }),
        }
    }

    violations
}

/// Human-readable violation messages; empty when every metric is valid.
#[must_use]
pub fn guardrail_check(metrics: &Map<String, Value>) -> Vec<String> {
    check_metrics(metrics)
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn present<'a>(metrics: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    metrics.get(field).filter(|v| !v.is_null())
}

fn as_rate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            if n.is_u64() {
                return Some(i64::MAX);
            }
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
