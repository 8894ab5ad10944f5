//! Speedtest telemetry storage.
//!
//! This crate provides:
//! - The persisted [`TelemetryRecord`] model
//! - [`TelemetryStore`], an append-only keyed store with newest-first reads

pub mod error;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use record::{TelemetryRecord, EMPTY_ISP_INFO};
pub use store::{TelemetryStore, BUCKET_NAME};
