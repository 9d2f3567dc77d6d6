//! Delivery outcomes and iteration reports
//!
//! These are the structured events the core emits. A report is created per
//! scheduler tick, handed to the observability sinks, then dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::generator::MeasurementRecord;

// =============================================================================
// Error Taxonomy
// =============================================================================

/// Why a single delivery attempt failed.
///
/// Per-target, non-fatal: carried as data, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    /// Target unreachable, refused, or name resolution failed
    ConnectionFailure,
    /// No response within the target's timeout
    Timeout,
    /// Response received with a non-2xx status
    UnexpectedStatus,
    /// Any other transport-level fault
    TransportError,
}

impl DeliveryErrorKind {
    /// Stable label used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryErrorKind::ConnectionFailure => "connection_failure",
            DeliveryErrorKind::Timeout => "timeout",
            DeliveryErrorKind::UnexpectedStatus => "unexpected_status",
            DeliveryErrorKind::TransportError => "transport_error",
        }
    }
}

impl std::fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Delivery Outcome
// =============================================================================

/// Result of one delivery attempt to one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    pub target_name: String,
    pub succeeded: bool,
    pub http_status: Option<u16>,
    pub error_cause: Option<DeliveryErrorKind>,
    /// Underlying cause, preserved for logging
    pub error_detail: Option<String>,
    #[serde(rename = "latency_ms", with = "duration_ms")]
    pub latency: Duration,
}

impl DeliveryOutcome {
    pub fn success(target_name: impl Into<String>, status: u16, latency: Duration) -> Self {
        Self {
            target_name: target_name.into(),
            succeeded: true,
            http_status: Some(status),
            error_cause: None,
            error_detail: None,
            latency,
        }
    }

    pub fn failure(
        target_name: impl Into<String>,
        cause: DeliveryErrorKind,
        detail: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            succeeded: false,
            http_status: None,
            error_cause: Some(cause),
            error_detail: Some(detail.into()),
            latency,
        }
    }

    /// Non-2xx response
    pub fn unexpected_status(target_name: impl Into<String>, status: u16, latency: Duration) -> Self {
        Self {
            http_status: Some(status),
            ..Self::failure(
                target_name,
                DeliveryErrorKind::UnexpectedStatus,
                format!("HTTP {}", status),
                latency,
            )
        }
    }

    /// Label for metrics: `success` or the error kind
    pub fn outcome_label(&self) -> &'static str {
        match self.error_cause {
            None => "success",
            Some(kind) => kind.as_str(),
        }
    }
}

// =============================================================================
// Iteration Report
// =============================================================================

/// Aggregate of one scheduler tick.
#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    pub record: MeasurementRecord,
    /// Sorted by target name
    pub outcomes: Vec<DeliveryOutcome>,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
}

impl IterationReport {
    /// Build a report, ordering outcomes by target name.
    pub fn new(
        record: MeasurementRecord,
        mut outcomes: Vec<DeliveryOutcome>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        outcomes.sort_by(|a, b| a.target_name.cmp(&b.target_name));
        Self {
            record,
            outcomes,
            started_at,
            elapsed,
        }
    }

    pub fn sequence_number(&self) -> u64 {
        self.record.sequence_number
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.succeeded)
    }

    pub fn outcome(&self, target_name: &str) -> Option<&DeliveryOutcome> {
        self.outcomes.iter().find(|o| o.target_name == target_name)
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_micros() as f64 / 1000.0)
    }
}
