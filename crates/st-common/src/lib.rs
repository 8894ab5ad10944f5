//! Speedtest backend common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Time-sortable record identifiers and their generator
//! - The unified error type with stable error codes

pub mod error;
pub mod id;

pub use error::{Error, Result};
pub use id::{RecordId, RecordIdGenerator};
