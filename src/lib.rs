//! e2sim - E2 Node Telemetry Simulator
//!
//! Periodically synthesises radio measurements for a single simulated cell
//! and fans each record out concurrently to a set of HTTP targets, the way
//! an E2 node reports indications to near-RT RIC xApps.
//!
//! # Architecture
//!
//! ```text
//! Scheduler ──tick──▶ Generator ──record──▶ Delivery Engine ──▶ targets…
//!     ▲                                          │
//!     └────────────── IterationReport ◀──────────┘ ──▶ ReportSink
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - HTTP transport and report sinks implementing domain ports
//! - [`config`] - YAML configuration and validation
//! - [`delivery`] - Concurrent per-iteration fan-out
//! - [`domain`] - Ports and report types
//! - [`error`] - Error types
//! - [`generator`] - Synthetic measurement records
//! - [`registry`] - Named delivery targets
//! - [`scheduler`] - Fixed-period iteration driver

pub mod adapters;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod error;
pub mod generator;
pub mod registry;
pub mod scheduler;

// Re-export commonly used types
pub use config::{ResolvedConfig, SimulatorConfig};
pub use delivery::DeliveryEngine;
pub use domain::{DeliveryErrorKind, DeliveryOutcome, IterationReport};
pub use error::{Error, Result};
pub use generator::{CellId, MeasurementGenerator, MeasurementRecord, PayloadFormat};
pub use registry::{Target, TargetRegistry, TargetSpec};
pub use scheduler::{IterationScheduler, SchedulerConfig, SchedulerSummary};
