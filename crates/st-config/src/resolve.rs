//! Config file resolution: CLI → env → working directory → defaults.

use crate::settings::Config;
use crate::validate::{validate, ConfigError};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "SPEEDTEST_CONFIG";

/// File looked up in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// The file that was loaded, if any.
    pub config_file: Option<PathBuf>,
    /// True when no file was found and built-in defaults are in effect.
    pub using_defaults: bool,
}

/// Resolve, load and validate the configuration.
///
/// An explicitly requested file (CLI flag or env var) must exist. The
/// implicit `./config.toml` is optional; when it is absent the defaults are
/// used.
pub fn resolve_config(cli_path: Option<&Path>) -> Result<(Config, ConfigPaths), ConfigError> {
    let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    resolve_with(cli_path, env_path.as_deref())
}

fn resolve_with(
    cli_path: Option<&Path>,
    env_path: Option<&Path>,
) -> Result<(Config, ConfigPaths), ConfigError> {
    let explicit = cli_path.or(env_path);

    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let implicit = PathBuf::from(DEFAULT_CONFIG_FILE);
            implicit.is_file().then_some(implicit)
        }
    };

    let Some(path) = path else {
        let config = Config::default();
        validate(&config)?;
        return Ok((
            config,
            ConfigPaths {
                config_file: None,
                using_defaults: true,
            },
        ));
    };

    let config = load_from_file(&path)?;
    validate(&config)?;
    Ok((
        config,
        ConfigPaths {
            config_file: Some(path),
            using_defaults: false,
        },
    ))
}

/// Read and parse one TOML file.
pub fn load_from_file(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
