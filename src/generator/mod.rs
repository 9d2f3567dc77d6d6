//! Measurement generator module
//!
//! Produces synthetic radio measurement records for the simulated cell,
//! and renders them into the payload shapes targets consume.

mod measurement;
mod payload;
mod proptest;
mod sampler;

pub use measurement::{bounds, CellId, LinkKpis, MeasurementRecord, DEFAULT_CELL_ID};
pub use payload::{KpmIndication, KpmMeasurement, PayloadFormat, REPORT_INDICATION};
pub use sampler::{MeasurementGenerator, MeasurementProfile, Span};
