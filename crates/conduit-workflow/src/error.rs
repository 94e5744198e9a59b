use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("workflows '{first}' and '{second}' are both bound to {method} {shape}")]
  DuplicateRoute {
    method: String,
    shape: String,
    first: String,
    second: String,
  },

  #[error("workflows '{first}' and '{second}' both watch {}", file_path.display())]
  DuplicateWatch {
    file_path: PathBuf,
    first: String,
    second: String,
  },

  #[error("watch workflow '{0}' cannot declare input validation")]
  ValidationOnWatch(String),
}
