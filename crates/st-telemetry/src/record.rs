//! Telemetry record model.
//!
//! One record is persisted per completed speed test. Measurement fields are
//! kept as the strings the client submitted; readers parse them lazily.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use st_common::RecordId;

/// `isp_info` value stored when the client sent no enrichment data.
pub const EMPTY_ISP_INFO: &str = "{}";

/// A single persisted speed test outcome.
///
/// `id` and `timestamp` are assigned by the store on save; whatever the
/// caller put there is overwritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "uuid")]
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    /// Raw client address at write time (anonymized only on display).
    #[serde(rename = "ip_address")]
    pub client_address: String,
    /// JSON-encoded `{processedString, rawIspInfo}` or `{}`.
    pub isp_info: String,
    #[serde(default)]
    pub extra: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub download: String,
    #[serde(default)]
    pub upload: String,
    #[serde(default)]
    pub ping: String,
    #[serde(default)]
    pub jitter: String,
    #[serde(default)]
    pub log: String,
}

impl TelemetryRecord {
    /// Whether the store has assigned an identity to this record.
    pub fn is_saved(&self) -> bool {
        !self.id.0.is_empty()
    }
}
