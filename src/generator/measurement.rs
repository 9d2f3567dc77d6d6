//! Measurement record value object
//!
//! A [`MeasurementRecord`] is one synthetic snapshot of a simulated cell.
//! Records are created by the generator and never mutated afterwards; the
//! delivery engine only ever reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::error::{Error, Result};

// =============================================================================
// Hard Bounds
// =============================================================================

/// Radio-plausible hard bounds for every measurement field.
///
/// Sampling profiles may narrow these ranges but never widen them.
pub mod bounds {
    use std::ops::RangeInclusive;

    /// PRB utilisation, percent
    pub const PRB_USAGE_PERCENT: RangeInclusive<f64> = 0.0..=100.0;
    /// Reference signal received power, dBm
    pub const RSRP_DBM: RangeInclusive<f64> = -140.0..=-44.0;
    /// Reference signal received quality, dB
    pub const RSRQ_DB: RangeInclusive<f64> = -20.0..=-3.0;
    /// Channel quality indicator
    pub const CQI: RangeInclusive<u8> = 0..=15;
    /// Modulation and coding scheme index
    pub const MCS: RangeInclusive<u8> = 0..=28;
    /// Packet loss and success ratios, percent
    pub const RATIO_PERCENT: RangeInclusive<f64> = 0.0..=100.0;
    /// Signal to interference plus noise ratio, dB
    pub const SINR_DB: RangeInclusive<f64> = -23.0..=40.0;
}

// =============================================================================
// Cell Identifier
// =============================================================================

/// Default simulated cell identifier
pub const DEFAULT_CELL_ID: u64 = 1_234_567;

/// Identifier of the simulated cell (value object, always positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(u64);

impl CellId {
    /// Create a cell id, rejecting zero.
    pub fn new(id: u64) -> Result<Self> {
        if id == 0 {
            return Err(Error::config("cellId must be a positive integer"));
        }
        Ok(Self(id))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self(DEFAULT_CELL_ID)
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Measurement Record
// =============================================================================

/// One synthetic radio/network measurement snapshot.
///
/// Serialises with the camelCase field names consumers expect, e.g.
/// `downlinkPrbUsage`, `rsrpDbm`, `sequenceNumber`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    /// When the record was generated
    pub timestamp: DateTime<Utc>,

    /// Simulated cell, constant for the process lifetime
    pub cell_id: CellId,

    /// Strictly increasing per generated record
    pub sequence_number: u64,

    /// Downlink PRB usage, percent
    pub downlink_prb_usage: f64,

    /// Uplink PRB usage, percent
    pub uplink_prb_usage: f64,

    pub active_ue_count: u32,

    pub downlink_throughput_mbps: f64,

    pub uplink_throughput_mbps: f64,

    pub latency_ms: f64,

    pub rsrp_dbm: f64,

    pub rsrq_db: f64,

    pub cqi: u8,

    pub mcs: u8,

    /// KPIs only rendered into KPM indications
    #[serde(skip)]
    pub link: LinkKpis,
}

/// Per-UE link KPIs sampled with each record.
///
/// Not part of the record's own wire shape; see
/// [`PayloadFormat::KpmIndication`](super::PayloadFormat::KpmIndication).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkKpis {
    /// UE the indication reports on, `1..=active_ue_count` (0 for an idle cell)
    pub reporting_ue: u32,
    pub packet_loss_dl_percent: f64,
    pub packet_loss_ul_percent: f64,
    pub sinr_db: f64,
    pub rrc_conn_estab_success_percent: f64,
}

impl MeasurementRecord {
    /// Names of the fields that fall outside the hard bounds.
    ///
    /// An empty list means the record is well-formed.
    pub fn bound_violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();

        if !in_range(self.downlink_prb_usage, &bounds::PRB_USAGE_PERCENT) {
            violations.push("downlinkPrbUsage");
        }
        if !in_range(self.uplink_prb_usage, &bounds::PRB_USAGE_PERCENT) {
            violations.push("uplinkPrbUsage");
        }
        if !non_negative(self.downlink_throughput_mbps) {
            violations.push("downlinkThroughputMbps");
        }
        if !non_negative(self.uplink_throughput_mbps) {
            violations.push("uplinkThroughputMbps");
        }
        if !non_negative(self.latency_ms) {
            violations.push("latencyMs");
        }
        if !in_range(self.rsrp_dbm, &bounds::RSRP_DBM) {
            violations.push("rsrpDbm");
        }
        if !in_range(self.rsrq_db, &bounds::RSRQ_DB) {
            violations.push("rsrqDb");
        }
        if !bounds::CQI.contains(&self.cqi) {
            violations.push("cqi");
        }
        if !bounds::MCS.contains(&self.mcs) {
            violations.push("mcs");
        }
        if self.link.reporting_ue > self.active_ue_count {
            violations.push("reportingUe");
        }
        if !in_range(self.link.packet_loss_dl_percent, &bounds::RATIO_PERCENT) {
            violations.push("packetLossDl");
        }
        if !in_range(self.link.packet_loss_ul_percent, &bounds::RATIO_PERCENT) {
            violations.push("packetLossUl");
        }
        if !in_range(self.link.sinr_db, &bounds::SINR_DB) {
            violations.push("sinrDb");
        }
        if !in_range(self.link.rrc_conn_estab_success_percent, &bounds::RATIO_PERCENT) {
            violations.push("rrcConnEstabSuccess");
        }

        violations
    }

    /// Check every field against the hard bounds
    pub fn is_within_bounds(&self) -> bool {
        self.bound_violations().is_empty()
    }
}

fn in_range(value: f64, range: &RangeInclusive<f64>) -> bool {
    value.is_finite() && range.contains(&value)
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}
