//! Speedtest backend configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for `config.toml`
//! - Config resolution (CLI → env → working directory → defaults)
//! - Semantic validation

pub mod resolve;
pub mod settings;
pub mod validate;

pub use resolve::{resolve_config, ConfigPaths, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
pub use settings::{
    Config, DatabaseConfig, DatabaseModel, FrontendConfig, IspConfig, LogConfig, LogFormat,
    RateLimitConfig, ServerConfig,
};
pub use validate::{validate, ConfigError};
