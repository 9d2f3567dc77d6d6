//! Target Registry
//!
//! Immutable-per-run set of named delivery targets. Loaded once at startup,
//! then shared read-only (behind an `Arc`) by every concurrent delivery task.

mod target;

pub use target::{Target, TargetSpec, DEFAULT_TARGET_TIMEOUT};

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::generator::PayloadFormat;

/// Validated, ordered collection of targets with unique names.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: Vec<Arc<Target>>,
}

impl TargetRegistry {
    /// Validate raw entries into a registry.
    ///
    /// Fails on zero entries, on any malformed entry, and on duplicate names.
    /// Iteration order is the configuration order.
    pub fn load(specs: &[TargetSpec]) -> Result<Self> {
        if specs.is_empty() {
            return Err(Error::config("no targets configured"));
        }

        let mut seen = HashSet::with_capacity(specs.len());
        let mut targets = Vec::with_capacity(specs.len());

        for (index, spec) in specs.iter().enumerate() {
            let target = spec.validate(index)?;
            if !seen.insert(target.name().to_string()) {
                return Err(Error::config(format!(
                    "target #{} duplicates target name '{}'",
                    index,
                    target.name()
                )));
            }
            debug!(target_name = %target.name(), url = %target.url(), "Loaded target");
            targets.push(Arc::new(target));
        }

        Ok(Self { targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Targets in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Target>> {
        self.targets.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Target>> {
        self.targets.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name()).collect()
    }

    /// Distinct payload formats in use, in first-seen order
    pub fn payload_formats(&self) -> Vec<PayloadFormat> {
        let mut formats = Vec::new();
        for target in &self.targets {
            if !formats.contains(&target.payload_format()) {
                formats.push(target.payload_format());
            }
        }
        formats
    }

    /// Largest per-target timeout; bounds worst-case shutdown latency.
    pub fn max_timeout(&self) -> std::time::Duration {
        self.targets
            .iter()
            .map(|t| t.timeout())
            .max()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spec(name: &str) -> TargetSpec {
        TargetSpec::new(name, "localhost", 8081, "/e2/indication")
    }

    #[test]
    fn test_load_preserves_order() {
        let registry =
            TargetRegistry::load(&[spec("qoe-predictor"), spec("kpimon"), spec("ran-control")])
                .unwrap();

        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
        assert_eq!(
            registry.names(),
            vec!["qoe-predictor", "kpimon", "ran-control"]
        );
    }

    #[test]
    fn test_payload_formats_are_distinct() {
        let registry = TargetRegistry::load(&[
            spec("ts"),
            spec("kpimon").with_payload_format(PayloadFormat::KpmIndication),
            spec("qoe-predictor"),
        ])
        .unwrap();
        assert_eq!(
            registry.payload_formats(),
            vec![PayloadFormat::Record, PayloadFormat::KpmIndication]
        );

        let registry = TargetRegistry::load(&[spec("a"), spec("b")]).unwrap();
        assert_eq!(registry.payload_formats(), vec![PayloadFormat::Record]);
    }

    #[test]
    fn test_load_empty_fails() {
        let err = TargetRegistry::load(&[]).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("no targets"));
    }

    #[test]
    fn test_load_duplicate_name_fails() {
        let err = TargetRegistry::load(&[spec("kpimon"), spec("ts"), spec("kpimon")]).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("duplicates target name 'kpimon'"));
    }

    #[test]
    fn test_load_malformed_entry_fails() {
        let mut bad = spec("ts");
        bad.port = Some(0);
        assert!(TargetRegistry::load(&[spec("kpimon"), bad]).is_err());
    }

    #[test]
    fn test_get_and_max_timeout() {
        let registry = TargetRegistry::load(&[
            spec("a").with_timeout_seconds(1.0),
            spec("b").with_timeout_seconds(3.0),
        ])
        .unwrap();

        assert_eq!(registry.get("b").unwrap().port(), 8081);
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.max_timeout(), Duration::from_secs(3));
    }
}
