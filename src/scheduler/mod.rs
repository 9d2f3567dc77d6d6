//! Scheduler module
//!
//! Fixed-period driver of the generate/deliver/publish cycle.

mod runner;

pub use runner::{
    IterationScheduler, SchedulerConfig, SchedulerState, SchedulerSummary, StopReason,
};
