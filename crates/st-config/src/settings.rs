//! Typed configuration model for `config.toml`.
//!
//! Every section and field has a default, so an empty or missing file yields
//! a runnable server. Keys are snake_case; the camelCase spellings used by
//! older deployments (`basePath`, `logFilePath`, `maxLogSize`, `chartlist`)
//! are accepted as aliases.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP port when none (or 0) is configured.
pub const DEFAULT_PORT: u16 = 8989;

/// Default bind host when none is configured.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default ISP lookup endpoint; the address is sent as `?ip=<addr>`.
pub const DEFAULT_LOOKUP_URL: &str = "https://ip.1888866.xyz/api/ip-lookup";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub database: DatabaseConfig,
    pub frontend: FrontendConfig,
    pub rate_limit: RateLimitConfig,
    pub isp: IspConfig,
}

impl Config {
    /// Parse a TOML document into a config (no validation).
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(alias = "basePath")]
    pub base_path: String,
    /// Number of request worker threads.
    pub workers: usize,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a reverse proxy that sets these headers.
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            base_path: String::new(),
            workers: 4,
            trust_proxy_headers: false,
        }
    }
}

impl ServerConfig {
    /// `host:port` to bind, with empty host and port 0 falling back to defaults.
    pub fn bind_address(&self) -> String {
        let host = if self.host.trim().is_empty() {
            DEFAULT_HOST
        } else {
            self.host.trim()
        };
        let port = if self.port == 0 { DEFAULT_PORT } else { self.port };
        if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        }
    }

    /// Base path with any trailing slash removed ("" for the root).
    pub fn normalized_base_path(&self) -> &str {
        self.base_path.trim_end_matches('/')
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Append logs to this file instead of stderr.
    #[serde(alias = "logFilePath")]
    pub file: Option<PathBuf>,
    /// Truncate the log file at startup once it exceeds this size (MiB).
    #[serde(alias = "maxLogSize")]
    pub max_size_mb: u64,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            max_size_mb: 5,
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LogConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseModel {
    /// On-disk store at `database.path`.
    #[default]
    #[serde(alias = "bolt")]
    Sqlite,
    /// Process-local store, lost on exit.
    Memory,
    /// Telemetry disabled; nothing is stored.
    None,
}

impl std::fmt::Display for DatabaseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseModel::Sqlite => write!(f, "sqlite"),
            DatabaseModel::Memory => write!(f, "memory"),
            DatabaseModel::None => write!(f, "none"),
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub model: DatabaseModel,
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            model: DatabaseModel::Sqlite,
            path: PathBuf::from("speedtest.db"),
        }
    }
}

/// `[frontend]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Number of records returned by the chart endpoint.
    #[serde(alias = "chartlist")]
    pub chart_list: usize,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self { chart_list: 100 }
    }
}

/// `[rate_limit]` section guarding the chart endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_secs: 10,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// `[isp]` section for address enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IspConfig {
    pub enabled: bool,
    pub lookup_url: String,
    pub timeout_secs: u64,
}

impl Default for IspConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            timeout_secs: 5,
        }
    }
}

impl IspConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.bind_address(), "0.0.0.0:8989");
        assert_eq!(config.frontend.chart_list, 100);
        assert_eq!(config.rate_limit.max_requests, 5);
    }

    #[test]
    fn legacy_camel_case_keys_are_accepted() {
        let text = r#"
            [server]
            host = "127.0.0.1"
            port = 0
            basePath = "/speed/"

            [log]
            logFilePath = "/var/log/speedtest.log"
            maxLogSize = 10

            [database]
            model = "bolt"
            path = "/var/lib/speedtest.db"

            [frontend]
            chartlist = 25
        "#;
        let config = Config::from_toml_str(text).unwrap();
        assert_eq!(config.server.bind_address(), "127.0.0.1:8989");
        assert_eq!(config.server.normalized_base_path(), "/speed");
        assert_eq!(config.log.max_size_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.database.model, DatabaseModel::Sqlite);
        assert_eq!(config.frontend.chart_list, 25);
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let server = ServerConfig {
            host: "::".into(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(server.bind_address(), "[::]:9000");
    }

    #[test]
    fn unknown_model_is_a_parse_error() {
        let err = Config::from_toml_str("[database]\nmodel = \"postgres\"\n");
        assert!(err.is_err());
    }
}
