//! Process-wide `tracing` subscriber setup.

use st_common::Error;
use st_config::{LogConfig, LogFormat};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber described by `[log]`.
///
/// `RUST_LOG` takes precedence over `log.level`. When `log.file` is set the
/// output goes there instead of stderr.
pub fn init_logging(config: &LogConfig) -> Result<(), Error> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| Error::InvalidConfig {
            field: "log.level".to_string(),
            reason: e.to_string(),
        })?,
    };

    let (writer, ansi) = match &config.file {
        Some(path) => {
            let file = open_log_file(path, config.max_size_bytes())?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);
    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_ansi(ansi).try_init(),
    };
    installed.map_err(|e| Error::Config(format!("logging already initialized: {e}")))
}

/// Open `path` for appending, truncating it first when it is larger than
/// `max_bytes`.
pub fn open_log_file(path: &Path, max_bytes: u64) -> Result<File, Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let oversized = match std::fs::metadata(path) {
        Ok(meta) => meta.len() > max_bytes,
        Err(_) => false,
    };

    let file = if oversized {
        OpenOptions::new().write(true).truncate(true).open(path)?
    } else {
        OpenOptions::new().create(true).append(true).open(path)?
    };
    Ok(file)
}
