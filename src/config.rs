use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{DEFAULT_BACKEND, DEFAULT_HOST};
use crate::core::{ForwardError, Result};

/// Default postfix configuration directory holding the lookup and credential files.
pub const DEFAULT_CONF_DIR: &str = "/etc/postfix/vhost";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub postfix: PostfixConfig,
    pub sqlite: SqliteConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: String,
    pub host: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            backend: DEFAULT_BACKEND.to_string(),
            host: DEFAULT_HOST.to_string(),
        }
    }
}

/// Postfix integration configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostfixConfig {
    pub conf_dir: PathBuf,
    /// Program used to apply main.cf settings.
    pub postconf: String,
}

impl Default for PostfixConfig {
    fn default() -> Self {
        PostfixConfig {
            conf_dir: PathBuf::from(DEFAULT_CONF_DIR),
            postconf: "postconf".to_string(),
        }
    }
}

/// SQLite-related configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SqliteConfig {
    pub path: Option<PathBuf>,
}

impl Config {
    /// Loads the configuration from `path`, or from the per-user default
    /// location when no path is given. A missing default file yields the
    /// built-in defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => load_config(path),
            None => match default_config_path() {
                Some(path) if path.exists() => load_config(path),
                _ => Ok(Config::default()),
            },
        }
    }
}

/// `<config dir>/postfix-forward/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("postfix-forward").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = postfix_forward::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| ForwardError::Config(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| ForwardError::Config(format!("{}: {}", path.display(), e)))
}
