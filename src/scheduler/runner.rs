//! Iteration Scheduler
//!
//! Drives generate → deliver → publish on a fixed period until cancelled.
//!
//! Iterations never overlap. Cancellation is observed between iterations;
//! an in-flight iteration always completes its deliveries first.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{ResolvedConfig, DEFAULT_PERIOD};
use crate::delivery::DeliveryEngine;
use crate::domain::{IterationReport, ReportSink};
use crate::generator::MeasurementGenerator;
use crate::registry::TargetRegistry;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between iteration starts
    pub period: Duration,

    /// Wait before the first iteration
    pub initial_delay: Duration,

    /// Stop after this many iterations; `None` runs until cancelled
    pub max_iterations: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            initial_delay: DEFAULT_PERIOD,
            max_iterations: None,
        }
    }
}

impl From<&ResolvedConfig> for SchedulerConfig {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            period: config.period,
            initial_delay: config.initial_delay,
            max_iterations: config.max_iterations,
        }
    }
}

// =============================================================================
// State Machine
// =============================================================================

/// Scheduler states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    /// Waiting for the next tick
    Idle,
    /// Iteration in progress
    Running,
    /// Cancelled; terminal
    Cancelled,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "Idle"),
            SchedulerState::Running => write!(f, "Running"),
            SchedulerState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Why the scheduler stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    Cancelled,
    MaxIterations,
}

/// Final accounting of a scheduler run
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSummary {
    pub run_id: Uuid,
    pub iterations: u64,
    pub last_sequence_number: Option<u64>,
    pub final_state: SchedulerState,
    pub stop_reason: StopReason,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Sequential driver of simulation iterations.
pub struct IterationScheduler {
    run_id: Uuid,
    config: SchedulerConfig,
    generator: MeasurementGenerator,
    engine: DeliveryEngine,
    registry: Arc<TargetRegistry>,
    sink: Arc<dyn ReportSink>,
    state: SchedulerState,
    iterations: u64,
    last_sequence_number: Option<u64>,
}

impl IterationScheduler {
    pub fn new(
        config: SchedulerConfig,
        generator: MeasurementGenerator,
        engine: DeliveryEngine,
        registry: Arc<TargetRegistry>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config,
            generator,
            engine,
            registry,
            sink,
            state: SchedulerState::Idle,
            iterations: 0,
            last_sequence_number: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Run until `cancel` fires or `max_iterations` is reached.
    #[instrument(skip(self, cancel), fields(run_id = %self.run_id))]
    pub async fn run(mut self, cancel: CancellationToken) -> SchedulerSummary {
        info!(
            period = ?self.config.period,
            initial_delay = ?self.config.initial_delay,
            targets = self.registry.len(),
            "Starting iteration scheduler"
        );

        if !self.config.initial_delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.finish(StopReason::Cancelled),
                _ = sleep(self.config.initial_delay) => {}
            }
        }

        loop {
            if cancel.is_cancelled() {
                return self.finish(StopReason::Cancelled);
            }

            let tick_start = Instant::now();
            self.run_iteration().await;

            if let Some(max) = self.config.max_iterations {
                if self.iterations >= max {
                    return self.finish(StopReason::MaxIterations);
                }
            }

            let remaining = self.config.period.saturating_sub(tick_start.elapsed());
            if remaining.is_zero() {
                warn!(
                    period = ?self.config.period,
                    elapsed = ?tick_start.elapsed(),
                    "Iteration overran its period, starting next immediately"
                );
                continue;
            }

            debug!("Waiting {:?} until next iteration", remaining);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.finish(StopReason::Cancelled),
                _ = sleep(remaining) => {}
            }
        }
    }

    /// Execute one tick: generate, deliver, publish.
    pub async fn run_iteration(&mut self) -> IterationReport {
        self.state = SchedulerState::Running;

        let record = self.generator.generate();
        let report = self.engine.deliver(record, &self.registry).await;

        if let Err(e) = self.sink.publish(&report).await {
            error!(
                sequence_number = report.sequence_number(),
                "Failed to publish iteration report: {}", e
            );
        }

        self.iterations += 1;
        self.last_sequence_number = Some(report.sequence_number());
        self.state = SchedulerState::Idle;
        report
    }

    fn finish(mut self, reason: StopReason) -> SchedulerSummary {
        if reason == StopReason::Cancelled {
            self.state = SchedulerState::Cancelled;
        }

        info!(
            iterations = self.iterations,
            last_sequence_number = ?self.last_sequence_number,
            reason = ?reason,
            "Iteration scheduler stopped"
        );

        SchedulerSummary {
            run_id: self.run_id,
            iterations: self.iterations,
            last_sequence_number: self.last_sequence_number,
            final_state: self.state,
            stop_reason: reason,
        }
    }
}

impl std::fmt::Debug for IterationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterationScheduler")
            .field("run_id", &self.run_id)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("iterations", &self.iterations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryReportCollector;
    use crate::domain::{DeliveryErrorKind, Transport, TransportFailure};
    use crate::error::{Error, Result};
    use crate::generator::CellId;
    use crate::registry::{Target, TargetSpec};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;

    /// Replies after a fixed delay, or never; records when each call started
    struct DelayedTransport {
        delay: Option<Duration>,
        calls: Mutex<Vec<Instant>>,
    }

    impl DelayedTransport {
        fn replying_after(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay: Some(delay),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn never_replying() -> Arc<Self> {
            Arc::new(Self {
                delay: None,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    #[async_trait]
    impl Transport for DelayedTransport {
        async fn send(
            &self,
            _target: &Target,
            _payload: Bytes,
        ) -> std::result::Result<u16, TransportFailure> {
            self.calls.lock().push(Instant::now());
            match self.delay {
                Some(delay) => {
                    sleep(delay).await;
                    Ok(200)
                }
                None => std::future::pending().await,
            }
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl ReportSink for BrokenSink {
        async fn publish(&self, _report: &IterationReport) -> Result<()> {
            Err(Error::Internal("collector offline".into()))
        }
    }

    fn scheduler(
        config: SchedulerConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ReportSink>,
        timeout_seconds: f64,
    ) -> IterationScheduler {
        let registry = TargetRegistry::load(&[TargetSpec::new(
            "kpimon",
            "localhost",
            8081,
            "/e2/indication",
        )
        .with_timeout_seconds(timeout_seconds)])
        .unwrap();

        IterationScheduler::new(
            config,
            MeasurementGenerator::with_seed(CellId::default(), 42),
            DeliveryEngine::new(transport),
            Arc::new(registry),
            sink,
        )
    }

    fn every(period_ms: u64, initial_delay_ms: u64) -> SchedulerConfig {
        SchedulerConfig {
            period: Duration::from_millis(period_ms),
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_iterations: None,
        }
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.period, Duration::from_secs(30));
        assert_eq!(config.initial_delay, Duration::from_secs(30));
        assert!(config.max_iterations.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_reports_in_three_and_a_half_seconds() {
        let collector = Arc::new(InMemoryReportCollector::new());
        let scheduler = scheduler(
            every(1000, 1000),
            DelayedTransport::replying_after(Duration::from_millis(50)),
            collector.clone(),
            5.0,
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(collector.len(), 3);

        cancel.cancel();
        let summary = handle.await.unwrap();

        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.final_state, SchedulerState::Cancelled);
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.last_sequence_number, Some(3));
        assert!(collector.reports().iter().all(|r| r.all_succeeded()));
        assert_eq!(collector.sequence_numbers(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_does_not_delay_schedule() {
        let collector = Arc::new(InMemoryReportCollector::new());
        let transport = DelayedTransport::never_replying();
        let scheduler = scheduler(every(2000, 0), transport.clone(), collector.clone(), 1.0);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        sleep(Duration::from_millis(4500)).await;
        cancel.cancel();
        handle.await.unwrap();

        let reports = collector.reports();
        assert_eq!(reports.len(), 3);
        for report in &reports {
            let outcome = report.outcome("kpimon").unwrap();
            assert!(!outcome.succeeded);
            assert_matches!(outcome.error_cause, Some(DeliveryErrorKind::Timeout));
            assert!(outcome.latency >= Duration::from_secs(1));
        }
        let gaps = transport.call_gaps();
        assert_eq!(gaps.len(), 2);
        for gap in gaps {
            assert!(gap >= Duration::from_secs(2));
            assert!(gap < Duration::from_millis(2010));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_starts_next_tick_immediately() {
        let collector = Arc::new(InMemoryReportCollector::new());
        let transport = DelayedTransport::replying_after(Duration::from_millis(1500));
        let config = SchedulerConfig {
            max_iterations: Some(3),
            ..every(1000, 0)
        };

        let summary = scheduler(config, transport.clone(), collector.clone(), 5.0)
            .run(CancellationToken::new())
            .await;

        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.stop_reason, StopReason::MaxIterations);
        assert_eq!(summary.final_state, SchedulerState::Idle);
        let gaps = transport.call_gaps();
        assert_eq!(gaps.len(), 2);
        for gap in gaps {
            assert!(gap >= Duration::from_millis(1500));
            assert!(gap < Duration::from_millis(1510));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_waits_for_in_flight_iteration() {
        let collector = Arc::new(InMemoryReportCollector::new());
        let scheduler = scheduler(
            every(1000, 0),
            DelayedTransport::replying_after(Duration::from_millis(800)),
            collector.clone(),
            5.0,
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        sleep(Duration::from_millis(300)).await;
        cancel.cancel();
        let summary = handle.await.unwrap();

        assert_eq!(summary.iterations, 1);
        assert_eq!(collector.len(), 1);
        assert!(collector.reports()[0].all_succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_initial_delay() {
        let collector = Arc::new(InMemoryReportCollector::new());
        let scheduler = scheduler(
            every(1000, 10_000),
            DelayedTransport::replying_after(Duration::ZERO),
            collector.clone(),
            5.0,
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = scheduler.run(cancel).await;

        assert_eq!(summary.iterations, 0);
        assert!(summary.last_sequence_number.is_none());
        assert_eq!(summary.final_state, SchedulerState::Cancelled);
        assert!(collector.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_does_not_stop_scheduler() {
        let config = SchedulerConfig {
            max_iterations: Some(2),
            ..every(100, 0)
        };
        let summary = scheduler(
            config,
            DelayedTransport::replying_after(Duration::ZERO),
            Arc::new(BrokenSink),
            5.0,
        )
        .run(CancellationToken::new())
        .await;

        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.last_sequence_number, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_iteration_advances_state() {
        let mut scheduler = scheduler(
            every(1000, 0),
            DelayedTransport::replying_after(Duration::from_millis(5)),
            Arc::new(InMemoryReportCollector::new()),
            5.0,
        );
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let first = scheduler.run_iteration().await;
        let second = scheduler.run_iteration().await;

        assert_eq!(first.sequence_number(), 1);
        assert_eq!(second.sequence_number(), 2);
        assert_eq!(scheduler.iterations(), 2);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }
}
