//! Conduit Config
//!
//! Serializable configuration for the conduit server. Every section has
//! defaults, so an empty JSON object (or no file at all) is a valid
//! configuration.
//!
//! ```json
//! {
//!   "server": { "bind": "0.0.0.0:8080", "body_limit_bytes": 1048576 },
//!   "auth": { "tokens": { "dev-token": { "sub": "dev", "roles": ["admin"] } } },
//!   "watch": [{ "file_path": "/var/log/app/events.jsonl", "start_at": "beginning" }],
//!   "log": { "level": "debug", "json": true }
//! }
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use conduit_trigger::WatchFileTrigger;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file {}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file {}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid config: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub server: ServerConfig,
  pub auth: AuthConfig,
  /// One ingest workflow is registered per entry.
  pub watch: Vec<WatchFileTrigger>,
  pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub bind: SocketAddr,
  /// Largest accepted request body.
  pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
      body_limit_bytes: 1024 * 1024,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
  /// Bearer token to the claims of the subject it identifies.
  pub tokens: HashMap<String, Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Default filter directive; `RUST_LOG` takes precedence.
  pub level: String,
  /// Emit JSON lines instead of human readable output.
  pub json: bool,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      json: false,
    }
  }
}

impl Config {
  /// Load and validate a JSON config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    config.validate()?;
    Ok(config)
  }

  /// Load `path` when given, otherwise fall back to defaults.
  pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
    match path {
      Some(path) => Self::load(path),
      None => Ok(Self::default()),
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.server.body_limit_bytes == 0 {
      return Err(ConfigError::Invalid(
        "server.body_limit_bytes must be positive".to_string(),
      ));
    }
    if self.log.level.trim().is_empty() {
      return Err(ConfigError::Invalid("log.level must not be empty".to_string()));
    }
    if let Some(entry) = self.watch.iter().find(|w| w.file_path.as_os_str().is_empty()) {
      return Err(ConfigError::Invalid(format!(
        "watch entry has an empty file_path: {:?}",
        entry
      )));
    }
    if let Some(entry) = self.watch.iter().find(|w| w.poll_interval_ms == 0) {
      return Err(ConfigError::Invalid(format!(
        "watch entry {} has a zero poll_interval_ms",
        entry.file_path.display()
      )));
    }
    Ok(())
  }
}
