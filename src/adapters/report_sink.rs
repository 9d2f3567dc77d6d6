//! Report Sink Adapters
//!
//! Implements the `ReportSink` port with various backends.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{IterationReport, ReportSink};
use crate::error::Result;

/// Logging-based report sink.
///
/// One summary line per iteration, one line per target outcome.
#[derive(Debug, Clone, Default)]
pub struct LoggingReportSink {
    /// Also dump the full report as JSON at debug level
    dump_json: bool,
}

impl LoggingReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json_dump() -> Self {
        Self { dump_json: true }
    }
}

#[async_trait]
impl ReportSink for LoggingReportSink {
    async fn publish(&self, report: &IterationReport) -> Result<()> {
        info!(
            sequence_number = report.sequence_number(),
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "=== Iteration {} ===",
            report.sequence_number()
        );

        for outcome in &report.outcomes {
            if outcome.succeeded {
                debug!(
                    target_name = %outcome.target_name,
                    status = ?outcome.http_status,
                    latency_ms = outcome.latency.as_millis() as u64,
                    "Delivered to target"
                );
            } else {
                warn!(
                    target_name = %outcome.target_name,
                    cause = %outcome.outcome_label(),
                    status = ?outcome.http_status,
                    detail = outcome.error_detail.as_deref().unwrap_or(""),
                    latency_ms = outcome.latency.as_millis() as u64,
                    "Delivery to target failed"
                );
            }
        }

        if self.dump_json {
            let json = serde_json::to_string(report).unwrap_or_else(|_| format!("{:?}", report));
            debug!(report = %json, "Iteration report");
        }

        Ok(())
    }
}

/// In-memory report collector for testing.
#[derive(Debug, Default)]
pub struct InMemoryReportCollector {
    reports: parking_lot::RwLock<Vec<IterationReport>>,
}

impl InMemoryReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected reports in publication order
    pub fn reports(&self) -> Vec<IterationReport> {
        self.reports.read().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }

    pub fn clear(&self) {
        self.reports.write().clear();
    }

    pub fn sequence_numbers(&self) -> Vec<u64> {
        self.reports
            .read()
            .iter()
            .map(|r| r.sequence_number())
            .collect()
    }
}

#[async_trait]
impl ReportSink for InMemoryReportCollector {
    async fn publish(&self, report: &IterationReport) -> Result<()> {
        self.reports.write().push(report.clone());
        Ok(())
    }
}

/// Readiness flag flipped by the first published report.
#[derive(Debug, Default)]
pub struct ReadinessSink {
    ready: AtomicBool,
    published: AtomicU64,
}

impl ReadinessSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReportSink for ReadinessSink {
    async fn publish(&self, _report: &IterationReport) -> Result<()> {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
        Ok(())
    }
}

/// Composite sink that publishes to multiple backends.
///
/// Every backend sees every report; the first error is returned after all
/// backends have been tried.
#[derive(Default)]
pub struct CompositeReportSink {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl CompositeReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for CompositeReportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeReportSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

#[async_trait]
impl ReportSink for CompositeReportSink {
    async fn publish(&self, report: &IterationReport) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.publish(report).await {
                warn!("Report sink failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeliveryOutcome;
    use crate::error::Error;
    use crate::generator::{CellId, MeasurementGenerator};
    use chrono::Utc;
    use std::time::Duration;

    struct FailingSink;

    #[async_trait]
    impl ReportSink for FailingSink {
        async fn publish(&self, _report: &IterationReport) -> Result<()> {
            Err(Error::Internal("sink down".into()))
        }
    }

    fn report(generator: &mut MeasurementGenerator) -> IterationReport {
        IterationReport::new(
            generator.generate(),
            vec![
                DeliveryOutcome::success("kpimon", 200, Duration::from_millis(5)),
                DeliveryOutcome::unexpected_status("ts", 502, Duration::from_millis(7)),
            ],
            Utc::now(),
            Duration::from_millis(8),
        )
    }

    #[tokio::test]
    async fn test_logging_sink() {
        let mut generator = MeasurementGenerator::with_seed(CellId::default(), 1);
        LoggingReportSink::new()
            .publish(&report(&mut generator))
            .await
            .unwrap();
        LoggingReportSink::with_json_dump()
            .publish(&report(&mut generator))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_collector() {
        let collector = InMemoryReportCollector::new();
        let mut generator = MeasurementGenerator::with_seed(CellId::default(), 1);
        assert!(collector.is_empty());

        collector.publish(&report(&mut generator)).await.unwrap();
        collector.publish(&report(&mut generator)).await.unwrap();

        assert_eq!(collector.len(), 2);
        assert_eq!(collector.sequence_numbers(), vec![1, 2]);
        assert_eq!(collector.reports()[1].failed_count(), 1);

        collector.clear();
        assert!(collector.is_empty());
    }

    #[tokio::test]
    async fn test_readiness_sink() {
        let readiness = ReadinessSink::new();
        assert!(!readiness.is_ready());

        let mut generator = MeasurementGenerator::with_seed(CellId::default(), 1);
        readiness.publish(&report(&mut generator)).await.unwrap();

        assert!(readiness.is_ready());
        assert_eq!(readiness.published(), 1);
    }

    #[tokio::test]
    async fn test_composite_reaches_all_sinks_despite_failure() {
        let collector = Arc::new(InMemoryReportCollector::new());
        let composite = CompositeReportSink::new()
            .with_sink(Arc::new(FailingSink))
            .with_sink(collector.clone());
        assert_eq!(composite.len(), 2);

        let mut generator = MeasurementGenerator::with_seed(CellId::default(), 1);
        let result = composite.publish(&report(&mut generator)).await;

        assert!(result.is_err());
        assert_eq!(collector.len(), 1);
    }
}
