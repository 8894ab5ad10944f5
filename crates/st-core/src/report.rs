//! Client address report (`getIP`).
//!
//! The report is what the speed test front end shows to the user and later
//! submits back verbatim as the `ispinfo` telemetry field.

use crate::isp::{isp_label, EnrichmentResult, IspLookup};
use crate::net::{classify, describe, PROCESSED_SEPARATOR};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// `{processedString, rawIspInfo}` payload returned to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressReport {
    #[serde(rename = "processedString")]
    pub processed_string: String,
    #[serde(rename = "rawIspInfo")]
    pub raw_isp_info: EnrichmentResult,
}

/// Build the report for `address`.
///
/// Non-public addresses are described locally and never looked up. Public
/// addresses are enriched only when `want_isp` is set.
pub fn report_address(address: &str, want_isp: bool, lookup: &dyn IspLookup) -> AddressReport {
    let category = classify(address);
    if !category.is_public() {
        debug!(address, %category, "non-public address, skipping enrichment");
        return AddressReport {
            processed_string: describe(address),
            raw_isp_info: EnrichmentResult::default(),
        };
    }

    let mut report = AddressReport {
        processed_string: address.to_string(),
        raw_isp_info: EnrichmentResult::default(),
    };

    if want_isp {
        let outcome = lookup.lookup(address);
        debug!(provider = lookup.name(), found = outcome.is_found(), "ISP lookup finished");
        let result = outcome.into_result();
        report.processed_string.push_str(PROCESSED_SEPARATOR);
        report.processed_string.push_str(&isp_label(&result));
        report.raw_isp_info = result;
    }

    report
}
