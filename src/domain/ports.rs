//! Domain Ports (Port/Adapter Pattern)
//!
//! The delivery engine and the scheduler depend only on these traits.
//! Infrastructure adapters in [`crate::adapters`] implement them.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Domain Layer                         │
//! │        Transport (outbound)   │   ReportSink (events)     │
//! └──────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                    │
//! │  HttpTransport │ LoggingReportSink │ PrometheusReportSink │
//! └──────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use super::report::{DeliveryErrorKind, IterationReport};
use crate::error::Result;
use crate::registry::Target;

// =============================================================================
// Transport Port
// =============================================================================

/// A transport-level failure, already classified into the delivery taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: DeliveryErrorKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: DeliveryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::ConnectionFailure, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Timeout, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::TransportError, message)
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Port for issuing one request to one target.
///
/// Implementations send `payload` to the target's endpoint and return the
/// response status code. They must not retry; the caller bounds the wait.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        target: &Target,
        payload: Bytes,
    ) -> std::result::Result<u16, TransportFailure>;
}

// =============================================================================
// Report Sink Port
// =============================================================================

/// Port for the observability collaborator that consumes iteration reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Consume one report. Errors are logged by the caller, never fatal.
    async fn publish(&self, report: &IterationReport) -> Result<()>;
}
