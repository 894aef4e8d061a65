//! Dex configuration
//!
//! Loaded from a YAML file, then overridden by environment variables.
//! Every field has a serde default so partial files are valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "dex.yaml";

/// Config errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Record store
    #[serde(default)]
    pub storage: StorageConfig,

    /// Bulk import
    #[serde(default)]
    pub import: ImportConfig,

    /// List endpoint
    #[serde(default)]
    pub query: QueryConfig,
}

impl ServiceConfig {
    /// Load config from `path`, or from `DEX_CONFIG`, or from `dex.yaml` if
    /// it exists; falls back to defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("DEX_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(&fallback)?
                } else {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env()?;
        Ok(config)
    }

    /// Parse a YAML config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply `DEX_*` environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("DEX_DATABASE") {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Some(address) = lookup("DEX_ADDRESS") {
            self.server.address = address;
        }
        if let Some(url) = lookup("DEX_SOURCE_URL") {
            self.import.source_url = url;
        }
        if let Some(mode) = lookup("DEX_IMPORT_MODE") {
            self.import.mode = mode.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DEX_IMPORT_MODE".to_string(),
                value: mode,
            })?;
        }
        Ok(())
    }
}

/// HTTP server config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_address")]
    pub address: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_address() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Record store config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Busy timeout for locked databases (milliseconds)
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".dex/records.db")
}

fn default_pool_size() -> u32 {
    8
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

/// How the Importer writes reconciled rows
///
/// Names are matched case-insensitively wherever they are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ImportMode {
    /// One transaction per entry; failures are logged and skipped
    #[default]
    Upsert,
    /// One transaction for the whole batch; any failure aborts everything
    Bulk,
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upsert" => Ok(ImportMode::Upsert),
            "bulk" => Ok(ImportMode::Bulk),
            other => Err(format!("unknown import mode '{other}'")),
        }
    }
}

impl TryFrom<String> for ImportMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Bulk import config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// External JSON feed
    #[serde(default = "default_source_url")]
    pub source_url: String,

    #[serde(default)]
    pub mode: ImportMode,

    /// Fetch timeout (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Fetch attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the n-th retry is n * backoff
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_source_url() -> String {
    "https://coralvanda.github.io/pokemon_data.json".to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    500
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            mode: ImportMode::default(),
            timeout_secs: default_fetch_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

/// List endpoint config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Requests above this limit are rejected
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

fn default_limit() -> u32 {
    10
}

fn default_max_limit() -> u32 {
    100
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}
