//! Domain Layer
//!
//! - **Ports** (`ports.rs`) - trait abstractions for outbound delivery and
//!   for the observability collaborator
//! - **Report** (`report.rs`) - per-target outcomes and per-tick reports

pub mod ports;
pub mod report;

pub use ports::{ReportSink, Transport, TransportFailure};
pub use report::{DeliveryErrorKind, DeliveryOutcome, IterationReport};
