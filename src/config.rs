//! Simulator configuration
//!
//! Loaded once at startup from a YAML file, then overridden by CLI/env
//! values in the binary. Validation happens here so that the process never
//! starts with a malformed configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::generator::{CellId, DEFAULT_CELL_ID};
use crate::registry::{TargetRegistry, TargetSpec};

/// Default iteration period
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

// =============================================================================
// File Schema
// =============================================================================

/// Configuration file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Seconds between iteration starts
    #[serde(default = "default_period_seconds")]
    pub period_seconds: f64,

    /// Seconds before the first iteration; defaults to one period
    #[serde(default)]
    pub initial_delay_seconds: Option<f64>,

    #[serde(default = "default_cell_id")]
    pub cell_id: u64,

    /// Fixed seed for reproducible sampling
    #[serde(default)]
    pub seed: Option<u64>,

    /// Stop after this many iterations
    #[serde(default)]
    pub max_iterations: Option<u64>,

    #[serde(default)]
    pub targets: Vec<TargetSpec>,
}

fn default_period_seconds() -> f64 {
    DEFAULT_PERIOD.as_secs_f64()
}

fn default_cell_id() -> u64 {
    DEFAULT_CELL_ID
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            period_seconds: default_period_seconds(),
            initial_delay_seconds: None,
            cell_id: default_cell_id(),
            seed: None,
            max_iterations: None,
            targets: Vec::new(),
        }
    }
}

impl SimulatorConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "cannot read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Validate every setting and build the runtime settings.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let period = positive_duration("periodSeconds", self.period_seconds)?;
        let initial_delay = match self.initial_delay_seconds {
            None => period,
            Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| {
                Error::config(format!(
                    "initialDelaySeconds must be a representable duration >= 0, got {}",
                    secs
                ))
            })?,
        };

        if self.max_iterations == Some(0) {
            return Err(Error::config("maxIterations must be >= 1 when set"));
        }

        Ok(ResolvedConfig {
            period,
            initial_delay,
            cell_id: CellId::new(self.cell_id)?,
            seed: self.seed,
            max_iterations: self.max_iterations,
            registry: TargetRegistry::load(&self.targets)?,
        })
    }
}

fn positive_duration(field: &str, secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        Ok(_) => Err(Error::config(format!("{} must be > 0, got {}", field, secs))),
        Err(e) => Err(Error::config(format!("{} is invalid ({}): {}", field, secs, e))),
    }
}

// =============================================================================
// Resolved Settings
// =============================================================================

/// Validated settings the simulator runs with.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub period: Duration,
    pub initial_delay: Duration,
    pub cell_id: CellId,
    pub seed: Option<u64>,
    pub max_iterations: Option<u64>,
    pub registry: TargetRegistry,
}
