//! Node configuration
//!
//! Sources, highest precedence first: command line, `LANDCHAIN_*`
//! environment variables, optional TOML file, built-in defaults.

use clap::{Parser, ValueEnum};
use landchain_core::{DEFAULT_DIFFICULTY, DEFAULT_FILE_NAME, MAX_DIFFICULTY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Port documented by the container image
pub const DEFAULT_PORT: u16 = 5000;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Command line of `landchain-node`
#[derive(Debug, Default, Parser)]
#[command(
    name = "landchain-node",
    version,
    about = "Land-certificate ledger node with proof-of-work and peer consensus"
)]
pub struct Cli {
    /// Port to listen on
    #[arg(env = "LANDCHAIN_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "LANDCHAIN_HOST")]
    pub host: Option<String>,

    /// Leading zero hex digits required by proof-of-work
    #[arg(long, env = "LANDCHAIN_DIFFICULTY")]
    pub difficulty: Option<u32>,

    /// Directory holding the chain snapshot and uploaded certificates
    #[arg(long, env = "LANDCHAIN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Timeout for each peer request during consensus
    #[arg(long, env = "LANDCHAIN_PEER_TIMEOUT_MS")]
    pub peer_timeout_ms: Option<u64>,

    /// Largest accepted request body (certificate uploads)
    #[arg(long, env = "LANDCHAIN_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// Log output format
    #[arg(long, value_enum, env = "LANDCHAIN_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// TOML configuration file
    #[arg(long, short, env = "LANDCHAIN_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Effective node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Address to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Proof-of-work difficulty
    pub difficulty: u32,
    /// Data directory
    pub data_dir: PathBuf,
    /// Per-peer request timeout in milliseconds
    pub peer_timeout_ms: u64,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            difficulty: DEFAULT_DIFFICULTY,
            data_dir: PathBuf::from("."),
            peer_timeout_ms: 5_000,
            max_upload_bytes: 16 * 1024 * 1024,
            log_format: LogFormat::Text,
        }
    }
}

impl NodeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the configuration from the command line
    ///
    /// # Errors
    /// Returns error if the config file cannot be read or parsed, or the
    /// result fails validation
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let base = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.apply(cli);
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file; absent keys keep their defaults
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Overlay values given on the command line or in the environment
    #[must_use]
    pub fn apply(mut self, cli: &Cli) -> Self {
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(host) = &cli.host {
            self.host.clone_from(host);
        }
        if let Some(difficulty) = cli.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(dir) = &cli.data_dir {
            self.data_dir.clone_from(dir);
        }
        if let Some(ms) = cli.peer_timeout_ms {
            self.peer_timeout_ms = ms;
        }
        if let Some(bytes) = cli.max_upload_bytes {
            self.max_upload_bytes = bytes;
        }
        if let Some(format) = cli.log_format {
            self.log_format = format;
        }
        self
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns the first out-of-range setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if !(1..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(ConfigError::Invalid(format!(
                "difficulty must be between 1 and {MAX_DIFFICULTY}, got {}",
                self.difficulty
            )));
        }
        if self.peer_timeout_ms == 0 {
            return Err(ConfigError::Invalid("peer_timeout_ms must be positive".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("max_upload_bytes must be positive".into()));
        }
        Ok(())
    }

    /// Chain snapshot file
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(DEFAULT_FILE_NAME)
    }

    /// Directory of uploaded certificates
    #[must_use]
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file malformed
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Setting out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
