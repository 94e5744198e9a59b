use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::method::HttpMethod;
use crate::path::PathTemplate;

/// Error type for trigger operations.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
  #[error("unsupported http method: {0}")]
  UnsupportedMethod(String),

  #[error("invalid path template '{path}': {message}")]
  InvalidPath { path: String, message: String },

  #[error("invalid trigger configuration: {0}")]
  InvalidConfig(String),
}

/// A declarative binding describing what invokes a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
  /// Invoked once per matching HTTP request.
  Http(HttpTrigger),

  /// Invoked once per registration with a long-lived line stream.
  WatchFile(WatchFileTrigger),
}

/// HTTP trigger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpTrigger {
  pub method: HttpMethod,

  /// Path template; may contain named parameters (`:id`).
  pub path: PathTemplate,
}

impl HttpTrigger {
  pub fn new(method: HttpMethod, path: &str) -> Result<Self, TriggerError> {
    Ok(Self {
      method,
      path: PathTemplate::parse(path)?,
    })
  }
}

/// Where a fresh file stream starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPosition {
  Beginning,
  #[default]
  End,
}

/// File-watch trigger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchFileTrigger {
  pub file_path: PathBuf,

  /// Reopen the stream and start a new handler invocation when it ends.
  #[serde(default = "default_auto_restart")]
  pub auto_restart: bool,

  #[serde(default)]
  pub start_at: StartPosition,

  /// How often to check the file for new data at end of file.
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,

  /// Pause between a stream ending and the next attempt.
  #[serde(default = "default_restart_delay_ms")]
  pub restart_delay_ms: u64,
}

fn default_auto_restart() -> bool {
  true
}

fn default_poll_interval_ms() -> u64 {
  250
}

fn default_restart_delay_ms() -> u64 {
  1000
}

impl WatchFileTrigger {
  pub fn new(file_path: impl Into<PathBuf>, auto_restart: bool) -> Self {
    Self {
      file_path: file_path.into(),
      auto_restart,
      start_at: StartPosition::default(),
      poll_interval_ms: default_poll_interval_ms(),
      restart_delay_ms: default_restart_delay_ms(),
    }
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn restart_delay(&self) -> Duration {
    Duration::from_millis(self.restart_delay_ms)
  }
}

impl Trigger {
  /// Human readable summary, e.g. `GET /health` or `watch /var/log/app.log`.
  pub fn describe(&self) -> String {
    match self {
      Trigger::Http(http) => format!("{} {}", http.method, http.path),
      Trigger::WatchFile(watch) => format!("watch {}", watch.file_path.display()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_http_trigger_serde() {
    let trigger = Trigger::Http(HttpTrigger::new(HttpMethod::Get, "/records/:id").unwrap());
    let value = serde_json::to_value(&trigger).unwrap();

    assert_eq!(
      value,
      json!({"type": "http", "method": "GET", "path": "/records/:id"})
    );
    assert_eq!(serde_json::from_value::<Trigger>(value).unwrap(), trigger);
  }

  #[test]
  fn test_watch_trigger_defaults() {
    let trigger: Trigger = serde_json::from_value(json!({
      "type": "watch_file",
      "file_path": "/var/log/app.log",
    }))
    .unwrap();

    let Trigger::WatchFile(watch) = trigger else {
      panic!("expected watch trigger");
    };
    assert!(watch.auto_restart);
    assert_eq!(watch.start_at, StartPosition::End);
    assert_eq!(watch.poll_interval(), Duration::from_millis(250));
  }

  #[test]
  fn test_describe() {
    let http = Trigger::Http(HttpTrigger::new(HttpMethod::Get, "/health").unwrap());
    assert_eq!(http.describe(), "GET /health");

    let watch = Trigger::WatchFile(WatchFileTrigger::new("/tmp/a.log", false));
    assert_eq!(watch.describe(), "watch /tmp/a.log");
  }
}
