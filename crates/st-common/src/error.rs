//! Error types for the speedtest backend.

use thiserror::Error;

/// Result type alias for speedtest backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the speedtest backend.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration value for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Storage errors (20-29)
    #[error("telemetry storage failed: {0}")]
    Storage(String),

    #[error("record {id} not found")]
    RecordNotFound { id: String },

    #[error("telemetry bucket does not exist")]
    BucketMissing,

    #[error("stored record is corrupted: {0}")]
    RecordCorrupted(String),

    // Server errors (40-49)
    #[error("HTTP server error: {0}")]
    Server(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for log fields and process exit mapping.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig { .. } => 11,
            Error::Storage(_) => 20,
            Error::RecordNotFound { .. } => 21,
            Error::BucketMissing => 22,
            Error::RecordCorrupted(_) => 23,
            Error::Server(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Whether the error belongs to the storage family (20-29).
    pub fn is_storage(&self) -> bool {
        (20..30).contains(&self.code())
    }
}
