//! Wire renderings of a measurement record
//!
//! A target chooses how it wants the record shaped. `record` sends the
//! record as is; `kpmIndication` wraps it in an E2SM-KPM style indication
//! with a flat list of named measurements, the shape KPI monitoring xApps
//! consume.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::measurement::{CellId, MeasurementRecord};
use crate::error::Result;

/// Payload shape a target expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayloadFormat {
    /// The camelCase measurement record
    #[default]
    Record,
    /// KPM indication envelope
    KpmIndication,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Record => "record",
            PayloadFormat::KpmIndication => "kpmIndication",
        }
    }

    /// Serialize `record` into this format.
    pub fn render(&self, record: &MeasurementRecord) -> Result<Bytes> {
        let body = match self {
            PayloadFormat::Record => serde_json::to_vec(record)?,
            PayloadFormat::KpmIndication => serde_json::to_vec(&KpmIndication::from(record))?,
        };
        Ok(Bytes::from(body))
    }
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// KPM Indication
// =============================================================================

/// Indication type carried by every periodic report
pub const REPORT_INDICATION: &str = "report";

/// One named KPM measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpmMeasurement {
    pub name: &'static str,
    pub value: f64,
}

/// E2SM-KPM style indication built from one record.
///
/// `indication_sn` is the record's sequence number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpmIndication {
    pub timestamp: DateTime<Utc>,
    pub cell_id: CellId,
    pub ue_id: String,
    pub measurements: Vec<KpmMeasurement>,
    pub indication_sn: u64,
    pub indication_type: &'static str,
}

impl From<&MeasurementRecord> for KpmIndication {
    fn from(record: &MeasurementRecord) -> Self {
        let link = &record.link;
        let measurements = [
            ("DRB.PacketLossDl", link.packet_loss_dl_percent),
            ("DRB.PacketLossUl", link.packet_loss_ul_percent),
            ("DRB.UEThpDl", record.downlink_throughput_mbps),
            ("DRB.UEThpUl", record.uplink_throughput_mbps),
            ("RRU.PrbUsedDl", record.downlink_prb_usage),
            ("RRU.PrbUsedUl", record.uplink_prb_usage),
            ("UE.RSRP", record.rsrp_dbm),
            ("UE.RSRQ", record.rsrq_db),
            ("UE.SINR", link.sinr_db),
            ("RRC.ConnEstabSucc", link.rrc_conn_estab_success_percent),
        ]
        .into_iter()
        .map(|(name, value)| KpmMeasurement { name, value })
        .collect();

        Self {
            timestamp: record.timestamp,
            cell_id: record.cell_id,
            ue_id: format!("ue_{:03}", link.reporting_ue),
            measurements,
            indication_sn: record.sequence_number,
            indication_type: REPORT_INDICATION,
        }
    }
}

impl KpmIndication {
    /// Value of the named measurement, if present
    pub fn measurement(&self, name: &str) -> Option<f64> {
        self.measurements
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MeasurementGenerator;

    fn record() -> MeasurementRecord {
        MeasurementGenerator::with_seed(CellId::new(77).unwrap(), 3).generate()
    }

    #[test]
    fn test_default_format_is_record() {
        assert_eq!(PayloadFormat::default(), PayloadFormat::Record);
        assert_eq!(PayloadFormat::KpmIndication.to_string(), "kpmIndication");
    }

    #[test]
    fn test_format_deserializes_camel_case() {
        let format: PayloadFormat = serde_yaml::from_str("kpmIndication").unwrap();
        assert_eq!(format, PayloadFormat::KpmIndication);
        assert!(serde_yaml::from_str::<PayloadFormat>("kpm_indication").is_err());
    }

    #[test]
    fn test_record_format_matches_record_json() {
        let record = record();
        let bytes = PayloadFormat::Record.render(&record).unwrap();
        assert_eq!(bytes, Bytes::from(serde_json::to_vec(&record).unwrap()));
    }

    #[test]
    fn test_kpm_indication_envelope() {
        let record = record();
        let indication = KpmIndication::from(&record);

        assert_eq!(indication.cell_id.get(), 77);
        assert_eq!(indication.indication_sn, 1);
        assert_eq!(indication.indication_type, "report");
        assert_eq!(indication.ue_id, format!("ue_{:03}", record.link.reporting_ue));
        assert_eq!(indication.measurements.len(), 10);
        assert_eq!(
            indication.measurement("RRU.PrbUsedDl"),
            Some(record.downlink_prb_usage)
        );
        assert_eq!(indication.measurement("UE.SINR"), Some(record.link.sinr_db));
        assert!(indication.measurement("UE.CQI").is_none());
    }

    #[test]
    fn test_kpm_indication_wire_shape() {
        let bytes = PayloadFormat::KpmIndication.render(&record()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["cell_id"], 77);
        assert_eq!(json["indication_sn"], 1);
        assert_eq!(json["indication_type"], "report");
        assert!(json["ue_id"].as_str().unwrap().starts_with("ue_"));
        assert!(json["timestamp"].is_string());

        let measurements = json["measurements"].as_array().unwrap();
        assert_eq!(measurements[0]["name"], "DRB.PacketLossDl");
        assert!(measurements[0]["value"].is_f64());
        assert_eq!(measurements[9]["name"], "RRC.ConnEstabSucc");
        assert!(json.get("sequenceNumber").is_none());
    }
}
