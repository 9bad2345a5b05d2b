//! Layered configuration: built-in defaults, an optional TOML file, then
//! `JOBSTORE_`-prefixed environment variables.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{MergePolicy, DEFAULT_DATA_COVERAGE, DEFAULT_EXPORT_VERSION};

pub const STORE_FILE_NAME: &str = "linkedin_job_searches_consolidated.json";
pub const ENV_PREFIX: &str = "JOBSTORE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// What to do when the backing file exists but cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptFilePolicy {
    /// Move the bad file aside and start from an empty store.
    #[default]
    Backup,
    /// Overwrite the bad file with a fresh store.
    Reset,
    /// Refuse to touch it.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: PathBuf,
    pub merge_policy: MergePolicy,
    pub corrupt_file_policy: CorruptFilePolicy,
    /// Take `<store>.lock` while writing.
    pub lock: bool,
    pub data_coverage: String,
    pub export_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            merge_policy: MergePolicy::default(),
            corrupt_file_policy: CorruptFilePolicy::default(),
            lock: true,
            data_coverage: DEFAULT_DATA_COVERAGE.to_string(),
            export_version: DEFAULT_EXPORT_VERSION.to_string(),
        }
    }
}

impl Config {
    /// Defaults with the store placed at `path`.
    pub fn with_store_path(path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: path.into(),
            ..Self::default()
        }
    }
}

fn default_store_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobstore") {
        proj_dirs.data_dir().join(STORE_FILE_NAME)
    } else {
        PathBuf::from("exports").join(STORE_FILE_NAME)
    }
}

/// Per-user config file location, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "jobstore").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration. An explicit `path` must exist; the per-user default is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            if let Some(default) = default_config_path() {
                figment = figment.merge(Toml::file(default));
            }
        }
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::string(toml_str))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}
