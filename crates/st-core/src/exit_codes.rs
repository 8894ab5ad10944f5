//! Exit codes for the st-core CLI.
//!
//! Stable so that service managers and scripts can tell startup failures
//! apart without parsing output.

use st_common::Error;

/// Exit codes for st-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean exit
    Clean = 0,

    /// Configuration could not be loaded or failed validation
    ConfigError = 10,

    /// Telemetry store could not be opened or read
    StorageError = 13,

    /// HTTP listener could not be started
    ServerError = 14,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Map an error onto the exit code for its family.
    pub fn for_error(error: &Error) -> Self {
        match error.code() {
            10..=19 => ExitCode::ConfigError,
            20..=29 => ExitCode::StorageError,
            40..=49 => ExitCode::ServerError,
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
