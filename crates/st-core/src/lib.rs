//! Speedtest telemetry backend core library.
//!
//! Address classification and anonymization, ISP enrichment, telemetry
//! ingestion, chart aggregation, and the HTTP front that ties them
//! together.

pub mod chart;
pub mod exit_codes;
pub mod isp;
pub mod logging;
pub mod net;
pub mod rate_limit;
pub mod recorder;
pub mod report;
pub mod web;

pub use chart::{ChartAggregator, DataPoint};
pub use exit_codes::ExitCode;
pub use isp::{EnrichmentResult, HttpIspLookup, IspLookup, LookupOutcome, NoopIspLookup};
pub use net::{anonymize, classify, AddressCategory};
pub use rate_limit::RateLimiter;
pub use recorder::{record_telemetry, RequestMeta, TelemetryForm};
pub use report::{report_address, AddressReport};
pub use web::AppState;
