//! Error types for telemetry store operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during telemetry store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The telemetry bucket has never been written to.
    #[error("storage bucket does not exist")]
    BucketMissing,

    /// No record under the requested key.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Stored bytes are not a valid record.
    #[error("failed to decode record {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Record could not be serialized.
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    /// Underlying storage engine failure.
    #[error("storage engine error: {0}")]
    Engine(#[from] rusqlite::Error),

    /// Filesystem failure preparing the store location.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// True for both a missing bucket and a missing key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::BucketMissing | StoreError::NotFound(_))
    }
}

impl From<StoreError> for st_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BucketMissing => st_common::Error::BucketMissing,
            StoreError::NotFound(id) => st_common::Error::RecordNotFound { id },
            StoreError::Decode { key, source } => {
                st_common::Error::RecordCorrupted(format!("{key}: {source}"))
            }
            StoreError::Io { source, .. } => st_common::Error::Io(source),
            other => st_common::Error::Storage(other.to_string()),
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
