//! Telemetry ingestion: form fields plus request metadata into a stored record.

use st_common::RecordId;
use st_telemetry::{StoreError, TelemetryRecord, TelemetryStore, EMPTY_ISP_INFO};
use tracing::{error, info};

/// Fields submitted by the speed test client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryForm {
    pub ispinfo: String,
    pub dl: String,
    pub ul: String,
    pub ping: String,
    pub jitter: String,
    pub log: String,
    pub extra: String,
}

impl TelemetryForm {
    /// Collect known fields from decoded `key=value` pairs. Later pairs win;
    /// unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut form = TelemetryForm::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "ispinfo" => &mut form.ispinfo,
                "dl" => &mut form.dl,
                "ul" => &mut form.ul,
                "ping" => &mut form.ping,
                "jitter" => &mut form.jitter,
                "log" => &mut form.log,
                "extra" => &mut form.extra,
                _ => continue,
            };
            *slot = value.into();
        }
        form
    }
}

/// Request metadata captured alongside the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub remote_address: String,
    pub user_agent: String,
    pub language: String,
}

/// Persist one speed test outcome and return its identifier.
pub fn record_telemetry(
    store: &TelemetryStore,
    form: TelemetryForm,
    meta: RequestMeta,
) -> Result<RecordId, StoreError> {
    let isp_info = if form.ispinfo.is_empty() {
        EMPTY_ISP_INFO.to_string()
    } else {
        form.ispinfo
    };

    let mut record = TelemetryRecord {
        client_address: meta.remote_address,
        isp_info,
        extra: form.extra,
        user_agent: meta.user_agent,
        language: meta.language,
        download: form.dl,
        upload: form.ul,
        ping: form.ping,
        jitter: form.jitter,
        log: form.log,
        ..TelemetryRecord::default()
    };

    match store.save(&mut record) {
        Ok(id) => {
            info!(id = %id, address = %record.client_address, "telemetry recorded");
            Ok(id)
        }
        Err(e) => {
            error!(error = %e, "error inserting into database");
            Err(e)
        }
    }
}
