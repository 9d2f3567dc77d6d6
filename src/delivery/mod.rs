//! Delivery module
//!
//! Concurrent multi-target fan-out of measurement records.

mod engine;

pub use engine::DeliveryEngine;
