//! Configuration errors and semantic validation.

use crate::settings::Config;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl From<ConfigError> for st_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid { field, reason } => st_common::Error::InvalidConfig {
                field: field.to_string(),
                reason,
            },
            other => st_common::Error::Config(other.to_string()),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Check semantic constraints that the type system does not capture.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.workers == 0 {
        return Err(invalid("server.workers", "must be at least 1"));
    }

    let base = &config.server.base_path;
    if !base.is_empty() && !base.starts_with('/') {
        return Err(invalid(
            "server.base_path",
            format!("must start with '/', got {base:?}"),
        ));
    }

    if config.frontend.chart_list == 0 {
        return Err(invalid("frontend.chart_list", "must be at least 1"));
    }

    if config.rate_limit.max_requests == 0 {
        return Err(invalid("rate_limit.max_requests", "must be at least 1"));
    }
    if config.rate_limit.window_secs == 0 {
        return Err(invalid("rate_limit.window_secs", "must be at least 1"));
    }

    if config.isp.enabled {
        let url = config.isp.lookup_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid(
                "isp.lookup_url",
                format!("must be an http(s) URL, got {url:?}"),
            ));
        }
        if config.isp.timeout_secs == 0 {
            return Err(invalid("isp.timeout_secs", "must be at least 1"));
        }
    }

    if config.database.path.as_os_str().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = Config::default();
        config.server.workers = 0;
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "server.workers", .. }));
    }

    #[test]
    fn relative_base_path_rejected() {
        let mut config = Config::default();
        config.server.base_path = "speed".into();
        assert!(validate(&config).is_err());
        config.server.base_path = "/speed".into();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn lookup_url_only_checked_when_enabled() {
        let mut config = Config::default();
        config.isp.lookup_url = "ftp://nope".into();
        assert!(validate(&config).is_err());
        config.isp.enabled = false;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn zero_window_rejected() {
        let mut config = Config::default();
        config.rate_limit.window_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn converts_into_common_error() {
        let err: st_common::Error = invalid("frontend.chart_list", "must be at least 1").into();
        assert_eq!(err.code(), 11);
    }
}
