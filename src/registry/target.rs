//! Delivery targets
//!
//! [`TargetSpec`] is a raw configuration entry as written by an operator;
//! [`Target`] is the validated, immutable form used by the delivery engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::generator::PayloadFormat;

/// Timeout applied when a target entry does not set one
pub const DEFAULT_TARGET_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Raw Configuration Entry
// =============================================================================

/// A target entry as it appears in the configuration file.
///
/// Every field is optional at the parsing stage so that missing fields are
/// reported as configuration errors naming the entry, not as parse errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetSpec {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<i64>,
    pub path: Option<String>,
    pub timeout_seconds: Option<f64>,
    /// Defaults to the plain record
    pub payload_format: Option<PayloadFormat>,
}

impl TargetSpec {
    /// Convenience constructor for a fully specified entry.
    pub fn new(name: &str, host: &str, port: u16, path: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            host: Some(host.to_string()),
            port: Some(i64::from(port)),
            path: Some(path.to_string()),
            timeout_seconds: None,
            payload_format: None,
        }
    }

    pub fn with_timeout_seconds(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_payload_format(mut self, format: PayloadFormat) -> Self {
        self.payload_format = Some(format);
        self
    }

    /// Validate this entry; `index` is its position in the target list.
    pub fn validate(&self, index: usize) -> Result<Target> {
        let label = match &self.name {
            Some(name) => format!("target #{} ({})", index, name),
            None => format!("target #{}", index),
        };

        let name = required(&self.name, &label, "name")?;
        let host = required(&self.host, &label, "host")?;
        let path = required(&self.path, &label, "path")?;
        let port = self
            .port
            .ok_or_else(|| Error::config(format!("{} is missing required field 'port'", label)))?;

        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| {
                Error::config(format!(
                    "{} has invalid port {} (expected 1-65535)",
                    label, port
                ))
            })?;

        if !path.starts_with('/') {
            return Err(Error::config(format!(
                "{} has invalid path '{}' (must start with '/')",
                label, path
            )));
        }

        let timeout = match self.timeout_seconds {
            None => DEFAULT_TARGET_TIMEOUT,
            Some(secs) => match Duration::try_from_secs_f64(secs) {
                Ok(timeout) if !timeout.is_zero() => timeout,
                _ => {
                    return Err(Error::config(format!(
                        "{} has invalid timeoutSeconds {} (must be > 0)",
                        label, secs
                    )))
                }
            },
        };

        Ok(Target {
            name,
            host,
            port,
            path,
            timeout,
            payload_format: self.payload_format.unwrap_or_default(),
        })
    }
}

fn required(value: &Option<String>, label: &str, field: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        Some(_) => Err(Error::config(format!(
            "{} has empty required field '{}'",
            label, field
        ))),
        None => Err(Error::config(format!(
            "{} is missing required field '{}'",
            label, field
        ))),
    }
}

// =============================================================================
// Validated Target
// =============================================================================

/// A delivery destination. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    name: String,
    host: String,
    port: u16,
    path: String,
    #[serde(with = "duration_secs")]
    timeout: Duration,
    payload_format: PayloadFormat,
}

impl Target {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bounded wait for one delivery attempt
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn payload_format(&self) -> PayloadFormat {
        self.payload_format
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Full endpoint URL, `http://<host>:<port><path>`
    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} ({:?}", self.name, self.url(), self.timeout)?;
        if self.payload_format != PayloadFormat::Record {
            write!(f, ", {}", self.payload_format)?;
        }
        write!(f, ")")
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_complete_spec() {
        let target = TargetSpec::new("kpimon", "kpimon.ricxapp", 8081, "/e2/indication")
            .with_timeout_seconds(2.5)
            .validate(0)
            .unwrap();

        assert_eq!(target.name(), "kpimon");
        assert_eq!(target.host(), "kpimon.ricxapp");
        assert_eq!(target.port(), 8081);
        assert_eq!(target.path(), "/e2/indication");
        assert_eq!(target.timeout(), Duration::from_millis(2500));
        assert_eq!(target.address(), "kpimon.ricxapp:8081");
        assert_eq!(target.url(), "http://kpimon.ricxapp:8081/e2/indication");
        assert_eq!(target.payload_format(), PayloadFormat::Record);
    }

    #[test]
    fn test_default_timeout() {
        let target = TargetSpec::new("a", "localhost", 80, "/")
            .validate(0)
            .unwrap();
        assert_eq!(target.timeout(), DEFAULT_TARGET_TIMEOUT);
    }

    #[test]
    fn test_missing_fields() {
        for field in ["name", "host", "port", "path"] {
            let mut spec = TargetSpec::new("a", "localhost", 80, "/x");
            match field {
                "name" => spec.name = None,
                "host" => spec.host = None,
                "port" => spec.port = None,
                _ => spec.path = None,
            }
            let err = spec.validate(3).unwrap_err();
            assert!(err.is_config());
            assert!(
                err.to_string().contains(&format!("'{}'", field)),
                "unexpected message: {}",
                err
            );
            assert!(err.to_string().contains("target #3"));
        }
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut spec = TargetSpec::new("a", "localhost", 80, "/x");
        spec.name = Some("   ".into());
        assert!(spec.validate(0).is_err());
    }

    #[test]
    fn test_invalid_ports() {
        for port in [0i64, -1, 65536] {
            let mut spec = TargetSpec::new("a", "localhost", 80, "/x");
            spec.port = Some(port);
            let err = spec.validate(0).unwrap_err();
            assert!(err.to_string().contains("invalid port"));
        }
    }

    #[test]
    fn test_invalid_path_and_timeout() {
        let spec = TargetSpec::new("a", "localhost", 80, "e2/indication");
        assert!(spec.validate(0).is_err());

        let spec = TargetSpec::new("a", "localhost", 80, "/x").with_timeout_seconds(0.0);
        assert!(spec.validate(0).is_err());

        let spec = TargetSpec::new("a", "localhost", 80, "/x").with_timeout_seconds(-3.0);
        assert!(spec.validate(0).is_err());
    }

    #[test]
    fn test_unrepresentable_timeout_rejected() {
        for secs in [1e20, f64::INFINITY, f64::NAN] {
            let err = TargetSpec::new("ts", "localhost", 80, "/x")
                .with_timeout_seconds(secs)
                .validate(2)
                .unwrap_err();
            assert!(err.is_config());
            assert!(err.to_string().contains("target #2 (ts)"));
            assert!(err.to_string().contains("timeoutSeconds"));
        }
    }

    #[test]
    fn test_spec_deserializes_camel_case() {
        let yaml = "name: ts\nhost: traffic-steering\nport: 8081\npath: /e2/indication\ntimeoutSeconds: 1\n";
        let spec: TargetSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.timeout_seconds, Some(1.0));
        assert_eq!(spec.port, Some(8081));
    }

    #[test]
    fn test_spec_rejects_unknown_fields() {
        let yaml = "name: ts\nhost: h\nport: 1\npath: /\nretries: 3\n";
        assert!(serde_yaml::from_str::<TargetSpec>(yaml).is_err());
    }

    #[test]
    fn test_display() {
        let target = TargetSpec::new("kpimon", "h", 1, "/p").validate(0).unwrap();
        assert_eq!(target.to_string(), "kpimon -> http://h:1/p (5s)");

        let target = TargetSpec::new("kpimon", "h", 1, "/p")
            .with_payload_format(PayloadFormat::KpmIndication)
            .validate(0)
            .unwrap();
        assert_eq!(
            target.to_string(),
            "kpimon -> http://h:1/p (5s, kpmIndication)"
        );
    }

    #[test]
    fn test_spec_payload_format() {
        let yaml = "name: kpimon\nhost: h\nport: 1\npath: /\npayloadFormat: kpmIndication\n";
        let spec: TargetSpec = serde_yaml::from_str(yaml).unwrap();
        let target = spec.validate(0).unwrap();
        assert_eq!(target.payload_format(), PayloadFormat::KpmIndication);

        let yaml = "name: kpimon\nhost: h\nport: 1\npath: /\npayloadFormat: protobuf\n";
        assert!(serde_yaml::from_str::<TargetSpec>(yaml).is_err());
    }
}
