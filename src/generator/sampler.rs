//! Measurement Generator
//!
//! Samples plausible radio measurements for a single simulated cell. The
//! generator exclusively owns the sequence counter: every call to
//! [`MeasurementGenerator::generate`] advances it by exactly one.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::ops::RangeInclusive;
use tracing::debug;

use super::measurement::{bounds, CellId, LinkKpis, MeasurementRecord};
use crate::error::{Error, Result};

/// Standard deviation of the MCS jitter around the CQI-derived index
const MCS_JITTER_SIGMA: f64 = 1.5;

// =============================================================================
// Sampling Spans
// =============================================================================

/// Closed interval sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        rng.gen_range(self.min..=self.max)
    }

    fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    fn within(&self, range: &RangeInclusive<f64>) -> bool {
        self.is_valid() && range.contains(&self.min) && range.contains(&self.max)
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Sampling ranges for each measurement field.
///
/// The default describes a moderately loaded macro cell.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementProfile {
    pub downlink_prb_usage: Span,
    pub uplink_prb_usage: Span,
    pub active_ue_count: (u32, u32),
    pub downlink_throughput_mbps: Span,
    pub uplink_throughput_mbps: Span,
    pub latency_ms: Span,
    pub rsrp_dbm: Span,
    pub rsrq_db: Span,
    pub cqi: (u8, u8),
    /// Shared by downlink and uplink
    pub packet_loss_percent: Span,
    pub sinr_db: Span,
    pub rrc_conn_estab_success_percent: Span,
}

impl Default for MeasurementProfile {
    fn default() -> Self {
        Self {
            downlink_prb_usage: Span::new(30.0, 85.0),
            uplink_prb_usage: Span::new(20.0, 70.0),
            active_ue_count: (10, 50),
            downlink_throughput_mbps: Span::new(10.0, 100.0),
            uplink_throughput_mbps: Span::new(5.0, 50.0),
            latency_ms: Span::new(10.0, 100.0),
            rsrp_dbm: Span::new(-120.0, -80.0),
            rsrq_db: Span::new(-15.0, -5.0),
            cqi: (*bounds::CQI.start(), *bounds::CQI.end()),
            packet_loss_percent: Span::new(0.1, 5.0),
            sinr_db: Span::new(5.0, 25.0),
            rrc_conn_estab_success_percent: Span::new(95.0, 99.9),
        }
    }
}

impl MeasurementProfile {
    /// A profile spanning the full hard bounds of every field.
    pub fn full_range() -> Self {
        Self {
            downlink_prb_usage: span_of(&bounds::PRB_USAGE_PERCENT),
            uplink_prb_usage: span_of(&bounds::PRB_USAGE_PERCENT),
            active_ue_count: (0, 200),
            downlink_throughput_mbps: Span::new(0.0, 1000.0),
            uplink_throughput_mbps: Span::new(0.0, 500.0),
            latency_ms: Span::new(0.0, 500.0),
            rsrp_dbm: span_of(&bounds::RSRP_DBM),
            rsrq_db: span_of(&bounds::RSRQ_DB),
            cqi: (*bounds::CQI.start(), *bounds::CQI.end()),
            packet_loss_percent: span_of(&bounds::RATIO_PERCENT),
            sinr_db: span_of(&bounds::SINR_DB),
            rrc_conn_estab_success_percent: span_of(&bounds::RATIO_PERCENT),
        }
    }

    /// Reject profiles that could produce values outside the hard bounds.
    pub fn validate(&self) -> Result<()> {
        let non_negative = 0.0..=f64::MAX;
        let checks = [
            ("downlinkPrbUsage", self.downlink_prb_usage.within(&bounds::PRB_USAGE_PERCENT)),
            ("uplinkPrbUsage", self.uplink_prb_usage.within(&bounds::PRB_USAGE_PERCENT)),
            ("downlinkThroughputMbps", self.downlink_throughput_mbps.within(&non_negative)),
            ("uplinkThroughputMbps", self.uplink_throughput_mbps.within(&non_negative)),
            ("latencyMs", self.latency_ms.within(&non_negative)),
            ("rsrpDbm", self.rsrp_dbm.within(&bounds::RSRP_DBM)),
            ("rsrqDb", self.rsrq_db.within(&bounds::RSRQ_DB)),
            ("activeUeCount", self.active_ue_count.0 <= self.active_ue_count.1),
            (
                "cqi",
                self.cqi.0 <= self.cqi.1 && bounds::CQI.contains(&self.cqi.1),
            ),
            ("packetLoss", self.packet_loss_percent.within(&bounds::RATIO_PERCENT)),
            ("sinrDb", self.sinr_db.within(&bounds::SINR_DB)),
            (
                "rrcConnEstabSuccess",
                self.rrc_conn_estab_success_percent.within(&bounds::RATIO_PERCENT),
            ),
        ];

        match checks.iter().find(|(_, ok)| !ok) {
            Some((field, _)) => Err(Error::config(format!(
                "measurement profile range for {} is empty or outside radio bounds",
                field
            ))),
            None => Ok(()),
        }
    }
}

fn span_of(range: &RangeInclusive<f64>) -> Span {
    Span::new(*range.start(), *range.end())
}

// =============================================================================
// Generator
// =============================================================================

/// Produces one [`MeasurementRecord`] per call.
#[derive(Debug)]
pub struct MeasurementGenerator {
    cell_id: CellId,
    next_sequence: u64,
    profile: MeasurementProfile,
    rng: StdRng,
}

impl MeasurementGenerator {
    /// Create a generator seeded from OS entropy.
    pub fn new(cell_id: CellId) -> Self {
        Self::from_rng(cell_id, StdRng::from_entropy())
    }

    /// Create a deterministic generator; equal seeds yield equal samples.
    pub fn with_seed(cell_id: CellId, seed: u64) -> Self {
        Self::from_rng(cell_id, StdRng::seed_from_u64(seed))
    }

    fn from_rng(cell_id: CellId, rng: StdRng) -> Self {
        Self {
            cell_id,
            next_sequence: 1,
            profile: MeasurementProfile::default(),
            rng,
        }
    }

    /// Replace the sampling profile after validating it.
    pub fn with_profile(mut self, profile: MeasurementProfile) -> Result<Self> {
        profile.validate()?;
        self.profile = profile;
        Ok(self)
    }

    pub fn cell_id(&self) -> CellId {
        self.cell_id
    }

    /// Sequence number the next record will carry
    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence
    }

    pub fn profile(&self) -> &MeasurementProfile {
        &self.profile
    }

    /// Generate the next record and advance the sequence counter.
    pub fn generate(&mut self) -> MeasurementRecord {
        let sequence_number = self.next_sequence;
        self.next_sequence += 1;

        let p = &self.profile;
        let rng = &mut self.rng;

        let cqi = rng.gen_range(p.cqi.0..=p.cqi.1);
        let active_ue_count = rng.gen_range(p.active_ue_count.0..=p.active_ue_count.1);
        let record = MeasurementRecord {
            timestamp: Utc::now(),
            cell_id: self.cell_id,
            sequence_number,
            downlink_prb_usage: p.downlink_prb_usage.sample(rng),
            uplink_prb_usage: p.uplink_prb_usage.sample(rng),
            active_ue_count,
            downlink_throughput_mbps: p.downlink_throughput_mbps.sample(rng),
            uplink_throughput_mbps: p.uplink_throughput_mbps.sample(rng),
            latency_ms: p.latency_ms.sample(rng),
            rsrp_dbm: p.rsrp_dbm.sample(rng),
            rsrq_db: p.rsrq_db.sample(rng),
            cqi,
            mcs: mcs_for_cqi(cqi, rng),
            link: LinkKpis {
                reporting_ue: match active_ue_count {
                    0 => 0,
                    n => rng.gen_range(1..=n),
                },
                packet_loss_dl_percent: p.packet_loss_percent.sample(rng),
                packet_loss_ul_percent: p.packet_loss_percent.sample(rng),
                sinr_db: p.sinr_db.sample(rng),
                rrc_conn_estab_success_percent: p.rrc_conn_estab_success_percent.sample(rng),
            },
        };

        debug!(
            cell_id = %record.cell_id,
            sequence_number,
            cqi = record.cqi,
            mcs = record.mcs,
            "Generated measurement record"
        );

        record
    }
}

/// Map CQI linearly onto the MCS table, then jitter and clamp.
fn mcs_for_cqi(cqi: u8, rng: &mut StdRng) -> u8 {
    let max_cqi = f64::from(*bounds::CQI.end());
    let max_mcs = f64::from(*bounds::MCS.end());
    let base = f64::from(cqi) * max_mcs / max_cqi;
    let jitter: f64 = rng.sample::<f64, _>(StandardNormal) * MCS_JITTER_SIGMA;

    (base + jitter).round().clamp(0.0, max_mcs) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> CellId {
        CellId::new(1234567).unwrap()
    }

    #[test]
    fn test_sequence_starts_at_one() {
        let mut generator = MeasurementGenerator::with_seed(cell(), 1);
        assert_eq!(generator.next_sequence_number(), 1);

        let record = generator.generate();
        assert_eq!(record.sequence_number, 1);
        assert_eq!(generator.next_sequence_number(), 2);
    }

    #[test]
    fn test_sequence_increments_by_one() {
        let mut generator = MeasurementGenerator::new(cell());
        let numbers: Vec<u64> = (0..50).map(|_| generator.generate().sequence_number).collect();

        for pair in numbers.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
    }

    #[test]
    fn test_cell_id_constant() {
        let mut generator = MeasurementGenerator::new(cell());
        for _ in 0..20 {
            assert_eq!(generator.generate().cell_id, cell());
        }
    }

    #[test]
    fn test_default_profile_is_valid() {
        assert!(MeasurementProfile::default().validate().is_ok());
        assert!(MeasurementProfile::full_range().validate().is_ok());
    }

    #[test]
    fn test_profile_rejects_out_of_bounds() {
        let profile = MeasurementProfile {
            rsrp_dbm: Span::new(-150.0, -80.0),
            ..Default::default()
        };
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("rsrpDbm"));
    }

    #[test]
    fn test_profile_rejects_inverted_span() {
        let profile = MeasurementProfile {
            latency_ms: Span::new(50.0, 10.0),
            ..Default::default()
        };
        assert!(profile.validate().is_err());

        let profile = MeasurementProfile {
            cqi: (3, 16),
            ..Default::default()
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_with_profile_validates() {
        let generator = MeasurementGenerator::with_seed(cell(), 5);
        let bad = MeasurementProfile {
            downlink_prb_usage: Span::new(0.0, 120.0),
            ..Default::default()
        };
        assert!(generator.with_profile(bad).is_err());
    }

    #[test]
    fn test_default_profile_sub_ranges() {
        let mut generator = MeasurementGenerator::with_seed(cell(), 99);
        for _ in 0..200 {
            let r = generator.generate();
            assert!((30.0..=85.0).contains(&r.downlink_prb_usage));
            assert!((20.0..=70.0).contains(&r.uplink_prb_usage));
            assert!((10..=50).contains(&r.active_ue_count));
            assert!((-120.0..=-80.0).contains(&r.rsrp_dbm));
            assert!((-15.0..=-5.0).contains(&r.rsrq_db));
            assert!((0.1..=5.0).contains(&r.link.packet_loss_dl_percent));
            assert!((5.0..=25.0).contains(&r.link.sinr_db));
            assert!((95.0..=99.9).contains(&r.link.rrc_conn_estab_success_percent));
            assert!((1..=r.active_ue_count).contains(&r.link.reporting_ue));
        }
    }

    #[test]
    fn test_same_seed_same_values() {
        let mut a = MeasurementGenerator::with_seed(cell(), 2024);
        let mut b = MeasurementGenerator::with_seed(cell(), 2024);

        for _ in 0..10 {
            let ra = a.generate();
            let rb = b.generate();
            assert_eq!(ra.sequence_number, rb.sequence_number);
            assert_eq!(ra.downlink_prb_usage, rb.downlink_prb_usage);
            assert_eq!(ra.rsrp_dbm, rb.rsrp_dbm);
            assert_eq!(ra.cqi, rb.cqi);
            assert_eq!(ra.mcs, rb.mcs);
        }
    }

    #[test]
    fn test_mcs_tracks_cqi() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(mcs_for_cqi(0, &mut rng) <= 8);
            assert!(mcs_for_cqi(15, &mut rng) >= 20);
        }
    }
}
