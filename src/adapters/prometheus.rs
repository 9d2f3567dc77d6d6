//! Prometheus Report Sink Adapter
//!
//! Implements the `ReportSink` port by updating Prometheus collectors that
//! the binary exposes on `/metrics`.

use async_trait::async_trait;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

use crate::domain::{IterationReport, ReportSink};
use crate::error::Result;

/// Latency buckets in seconds, from 1ms to 30s
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Prometheus-backed report sink.
#[derive(Clone)]
pub struct PrometheusReportSink {
    iterations: IntCounter,
    last_sequence_number: IntGauge,
    deliveries: IntCounterVec,
    delivery_latency: HistogramVec,
    iteration_duration: Histogram,
}

impl PrometheusReportSink {
    /// Create the collectors and register them with `registry`.
    pub fn new(registry: &Registry) -> Result<Self> {
        let iterations = IntCounter::new(
            "e2sim_iterations_total",
            "Total number of completed simulation iterations",
        )?;
        let last_sequence_number = IntGauge::new(
            "e2sim_last_sequence_number",
            "Sequence number of the most recently delivered record",
        )?;
        let deliveries = IntCounterVec::new(
            Opts::new(
                "e2sim_deliveries_total",
                "Delivery attempts by target and outcome",
            ),
            &["target", "outcome"],
        )?;
        let delivery_latency = HistogramVec::new(
            HistogramOpts::new(
                "e2sim_delivery_latency_seconds",
                "Per-target delivery attempt latency",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["target"],
        )?;
        let iteration_duration = Histogram::with_opts(
            HistogramOpts::new(
                "e2sim_iteration_duration_seconds",
                "Wall time of one fan-out across all targets",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(iterations.clone()))?;
        registry.register(Box::new(last_sequence_number.clone()))?;
        registry.register(Box::new(deliveries.clone()))?;
        registry.register(Box::new(delivery_latency.clone()))?;
        registry.register(Box::new(iteration_duration.clone()))?;

        Ok(Self {
            iterations,
            last_sequence_number,
            deliveries,
            delivery_latency,
            iteration_duration,
        })
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.get()
    }

    pub fn deliveries(&self, target: &str, outcome: &str) -> u64 {
        self.deliveries.with_label_values(&[target, outcome]).get()
    }
}

impl std::fmt::Debug for PrometheusReportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusReportSink")
            .field("iterations", &self.iterations.get())
            .finish()
    }
}

#[async_trait]
impl ReportSink for PrometheusReportSink {
    async fn publish(&self, report: &IterationReport) -> Result<()> {
        self.iterations.inc();
        self.last_sequence_number
            .set(i64::try_from(report.sequence_number()).unwrap_or(i64::MAX));
        self.iteration_duration
            .observe(report.elapsed.as_secs_f64());

        for outcome in &report.outcomes {
            self.deliveries
                .with_label_values(&[outcome.target_name.as_str(), outcome.outcome_label()])
                .inc();
            self.delivery_latency
                .with_label_values(&[outcome.target_name.as_str()])
                .observe(outcome.latency.as_secs_f64());
        }

        Ok(())
    }
}
