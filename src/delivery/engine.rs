//! Delivery Engine
//!
//! Fans one measurement record out to every registered target. The record is
//! rendered once per payload format in use, then each target gets its own
//! spawned task; the engine gathers every task before returning.
//!
//! # Isolation Guarantees
//!
//! 1. One attempt per target per record, never retried within an iteration
//! 2. Each attempt is bounded by its own target's timeout
//! 3. A slow, failing or panicking target never delays or alters another
//! 4. Every call returns a complete report; failures are data, not errors

use bytes::Bytes;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, instrument, warn, Instrument};

use crate::domain::{DeliveryErrorKind, DeliveryOutcome, IterationReport, Transport};
use crate::generator::{MeasurementRecord, PayloadFormat};
use crate::registry::{Target, TargetRegistry};

/// Scatter/gather delivery over a [`Transport`].
#[derive(Clone)]
pub struct DeliveryEngine {
    transport: Arc<dyn Transport>,
}

impl DeliveryEngine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Deliver `record` to every target in `registry`.
    ///
    /// Returns once every target has reached a terminal outcome.
    #[instrument(
        skip(self, record, registry),
        fields(sequence_number = record.sequence_number, targets = registry.len())
    )]
    pub async fn deliver(
        &self,
        record: MeasurementRecord,
        registry: &TargetRegistry,
    ) -> IterationReport {
        let started_at = Utc::now();
        let start = Instant::now();

        // Render each payload format in use exactly once
        let payloads: Vec<(PayloadFormat, std::result::Result<Bytes, String>)> = registry
            .payload_formats()
            .into_iter()
            .map(|format| {
                let rendered = format.render(&record).map_err(|e| {
                    warn!(format = %format, "Failed to render payload: {}", e);
                    format!("payload rendering failed: {}", e)
                });
                (format, rendered)
            })
            .collect();

        // Scatter: one supervised task per target
        let (names, tasks): (Vec<String>, Vec<_>) = registry
            .iter()
            .map(|target| {
                let rendered = payloads
                    .iter()
                    .find(|(format, _)| *format == target.payload_format())
                    .map(|(_, rendered)| rendered.clone())
                    .unwrap_or_else(|| Err("no payload rendered".to_string()));

                let task = match rendered {
                    Ok(payload) => tokio::spawn(
                        attempt(Arc::clone(&self.transport), Arc::clone(target), payload)
                            .in_current_span(),
                    ),
                    Err(detail) => {
                        let outcome = DeliveryOutcome::failure(
                            target.name(),
                            DeliveryErrorKind::TransportError,
                            detail,
                            Duration::ZERO,
                        );
                        tokio::spawn(async move { outcome })
                    }
                };
                (target.name().to_string(), task)
            })
            .unzip();

        // Gather: collect every result, a failed task only affects its own slot
        let outcomes = names
            .into_iter()
            .zip(join_all(tasks).await)
            .map(|(name, joined)| {
                joined.unwrap_or_else(|e| {
                    warn!(target_name = %name, "Delivery task failed: {}", e);
                    DeliveryOutcome::failure(
                        name,
                        DeliveryErrorKind::TransportError,
                        format!("delivery task failed: {}", e),
                        start.elapsed(),
                    )
                })
            })
            .collect();

        let report = IterationReport::new(record, outcomes, started_at, start.elapsed());
        debug!(
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Delivery fan-out complete"
        );
        report
    }
}

impl std::fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEngine").finish_non_exhaustive()
    }
}

/// One bounded attempt against one target.
async fn attempt(
    transport: Arc<dyn Transport>,
    target: Arc<Target>,
    payload: Bytes,
) -> DeliveryOutcome {
    let start = Instant::now();
    let result = timeout(target.timeout(), transport.send(&target, payload)).await;
    let latency = start.elapsed();

    match result {
        Ok(Ok(status)) if (200..300).contains(&status) => {
            debug!(target_name = %target.name(), status, ?latency, "Delivered");
            DeliveryOutcome::success(target.name(), status, latency)
        }
        Ok(Ok(status)) => DeliveryOutcome::unexpected_status(target.name(), status, latency),
        Ok(Err(failure)) => {
            DeliveryOutcome::failure(target.name(), failure.kind, failure.message, latency)
        }
        Err(_) => DeliveryOutcome::failure(
            target.name(),
            DeliveryErrorKind::Timeout,
            format!("no response within {:?}", target.timeout()),
            latency,
        ),
    }
}
