//! Chart data aggregation.
//!
//! Turns the most recent telemetry records into a numeric series for the
//! results chart. Stored addresses are re-anonymized on the way out; the
//! store itself keeps raw addresses.
//!
//! A malformed record never fails the request: unparseable measurements
//! become `0.0`, an undecodable ISP blob is replaced by a placeholder, and a
//! blob that cannot be re-encoded becomes `{}`.

use crate::net::{anonymize, split_processed_string};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use st_telemetry::{StoreError, TelemetryRecord, TelemetryStore, EMPTY_ISP_INFO};
use tracing::warn;

/// Placeholder processed string for records whose ISP blob is unreadable.
pub const UNKNOWN_PROCESSED: &str = "unknown";

/// One chart sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub download: f64,
    pub upload: f64,
    pub ping: f64,
    pub jitter: f64,
    /// Re-encoded, anonymized ISP blob.
    pub isp: String,
}

/// Stored `isp_info` blob as the chart reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IspInfo {
    #[serde(rename = "processedString")]
    pub processed_string: String,
    #[serde(rename = "rawIspInfo")]
    pub raw_isp_info: RawIspInfo,
}

/// Raw lookup data inside an ISP blob. Fields other than `ip` are carried
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawIspInfo {
    #[serde(default)]
    pub ip: String,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl IspInfo {
    fn unknown() -> Self {
        Self {
            processed_string: UNKNOWN_PROCESSED.to_string(),
            raw_isp_info: RawIspInfo::default(),
        }
    }
}

/// Builds chart series from the telemetry store.
#[derive(Debug, Clone, Copy)]
pub struct ChartAggregator<'a> {
    store: &'a TelemetryStore,
}

impl<'a> ChartAggregator<'a> {
    pub fn new(store: &'a TelemetryStore) -> Self {
        Self { store }
    }

    /// The `limit` most recent records as chart points, newest first.
    pub fn build_chart_series(&self, limit: usize) -> Result<Vec<DataPoint>, StoreError> {
        let records = self.store.get_last_n(limit)?;
        Ok(records.iter().map(to_data_point).collect())
    }
}

/// Project one record onto a chart point.
pub fn to_data_point(record: &TelemetryRecord) -> DataPoint {
    DataPoint {
        timestamp: record.timestamp,
        download: parse_measurement(&record.download),
        upload: parse_measurement(&record.upload),
        ping: parse_measurement(&record.ping),
        jitter: parse_measurement(&record.jitter),
        isp: sanitize_isp_info(&record.isp_info, &record.id.0),
    }
}

fn parse_measurement(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(0.0)
}

/// Decode, anonymize and re-encode a stored ISP blob.
pub fn sanitize_isp_info(raw: &str, record_id: &str) -> String {
    let mut info: IspInfo = match serde_json::from_str(raw) {
        Ok(info) => info,
        Err(e) => {
            warn!(error = %e, record = record_id, "failed to decode ISP info");
            IspInfo::unknown()
        }
    };

    // The embedded address and the raw ip are anonymized independently.
    let (embedded_ip, remainder) =
        split_processed_string(&info.processed_string).unwrap_or(("", ""));
    info.processed_string = format!("{}{}", anonymize(embedded_ip), remainder);
    info.raw_isp_info.ip = anonymize(&info.raw_isp_info.ip);

    match serde_json::to_string(&info) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(error = %e, record = record_id, "failed to encode ISP info");
            EMPTY_ISP_INFO.to_string()
        }
    }
}
