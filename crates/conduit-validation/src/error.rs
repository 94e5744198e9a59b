use std::collections::BTreeMap;

use conduit_problem::ProblemDetails;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Stable machine-readable code for a failed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
  InvalidType,
  InvalidString,
  TooSmall,
  TooBig,
  InvalidEnumValue,
  Custom,
}

impl ErrorCode {
  pub fn as_str(self) -> &'static str {
    match self {
      ErrorCode::InvalidType => "invalid_type",
      ErrorCode::InvalidString => "invalid_string",
      ErrorCode::TooSmall => "too_small",
      ErrorCode::TooBig => "too_big",
      ErrorCode::InvalidEnumValue => "invalid_enum_value",
      ErrorCode::Custom => "custom",
    }
  }
}

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
  /// Human readable explanation.
  pub message: String,
  pub code: ErrorCode,
  /// Dotted path from the field name down to the failing value,
  /// e.g. `address.city` or `tags.1`.
  pub path: String,
}

impl FieldError {
  pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      code,
      path: path.into(),
    }
  }
}

impl From<&FieldError> for Value {
  fn from(error: &FieldError) -> Self {
    json!({
      "message": error.message,
      "code": error.code.as_str(),
      "path": error.path,
    })
  }
}

/// Failures keyed by top-level field name. Fields that passed are absent.
pub type FieldErrors = BTreeMap<String, Vec<FieldError>>;

/// The 400 `validation-failed` problem carrying `errors` under `errors`.
pub fn validation_problem(errors: &FieldErrors) -> ProblemDetails {
  let errors: Map<String, Value> = errors
    .iter()
    .map(|(field, failures)| {
      let failures = failures.iter().map(Value::from).collect();
      (field.clone(), Value::Array(failures))
    })
    .collect();
  ProblemDetails::validation_failed(Value::Object(errors))
}
