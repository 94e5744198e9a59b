use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kind::ProblemKind;

/// Members that extensions are never allowed to overwrite.
pub const RESERVED_KEYS: [&str; 5] = ["type", "title", "status", "detail", "instance"];

const DEFAULT_TYPE: &str = "about:blank";
const DEFAULT_STATUS: u16 = 500;

/// A structured error body.
///
/// Constructed once and then only read, apart from the extension bag which
/// callers may grow before the problem is raised (the validation pipeline
/// attaches field errors under `errors` this way).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{status} {title}")]
pub struct ProblemDetails {
  problem_type: String,
  title: String,
  status: u16,
  detail: Option<String>,
  instance: Option<String>,
  extensions: Map<String, Value>,
}

/// The optional inputs a problem can be built from.
///
/// Missing members are filled by [`ProblemDetails::from_partial`].
#[derive(Debug, Clone, Default)]
pub struct PartialProblem {
  pub problem_type: Option<String>,
  pub title: Option<String>,
  pub status: Option<u16>,
  pub detail: Option<String>,
  pub instance: Option<String>,
  pub extensions: Map<String, Value>,
}

impl ProblemDetails {
  /// Build a problem from a status code alone.
  pub fn new(status: u16) -> Self {
    Self::from_partial(PartialProblem {
      status: Some(status),
      ..Default::default()
    })
  }

  /// Build a problem, filling absent members with defaults.
  ///
  /// `status` defaults to 500 and is clamped to 500 when it is not a valid
  /// HTTP status. `title` defaults to the canonical reason phrase for the
  /// status, `detail` defaults to the title and `type` to `about:blank`.
  pub fn from_partial(partial: PartialProblem) -> Self {
    let status = partial
      .status
      .filter(|s| (100..=599).contains(s))
      .unwrap_or(DEFAULT_STATUS);
    let title = partial.title.unwrap_or_else(|| reason_phrase(status));
    let detail = partial.detail.unwrap_or_else(|| title.clone());

    Self {
      problem_type: partial
        .problem_type
        .unwrap_or_else(|| DEFAULT_TYPE.to_string()),
      title,
      status,
      detail: Some(detail),
      instance: partial.instance,
      extensions: partial.extensions,
    }
  }

  /// Build the canonical problem for a failure class.
  pub fn from_kind(kind: ProblemKind, detail: impl Into<String>) -> Self {
    Self::from_partial(PartialProblem {
      problem_type: Some(kind.slug().to_string()),
      title: Some(kind.title().to_string()),
      status: Some(kind.status()),
      detail: Some(detail.into()),
      ..Default::default()
    })
  }

  /// A 400 with the field-error map attached under `errors`.
  pub fn validation_failed(errors: Value) -> Self {
    Self::from_kind(
      ProblemKind::ValidationFailed,
      "one or more fields failed validation",
    )
    .with_extension("errors", errors)
  }

  pub fn unauthorized(detail: impl Into<String>) -> Self {
    Self::from_kind(ProblemKind::Unauthorized, detail)
  }

  pub fn forbidden(detail: impl Into<String>) -> Self {
    Self::from_kind(ProblemKind::Forbidden, detail)
  }

  pub fn not_found(detail: impl Into<String>) -> Self {
    Self::from_kind(ProblemKind::NotFound, detail)
  }

  pub fn unsupported_media_type(detail: impl Into<String>) -> Self {
    Self::from_kind(ProblemKind::UnsupportedMediaType, detail)
  }

  pub fn not_implemented(detail: impl Into<String>) -> Self {
    Self::from_kind(ProblemKind::NotImplemented, detail)
  }

  /// The client-visible form of an uncaught error. Carries no `detail`.
  pub fn internal() -> Self {
    Self::from_kind(ProblemKind::Internal, "").without_detail()
  }

  pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
    self.detail = Some(detail.into());
    self
  }

  pub fn without_detail(mut self) -> Self {
    self.detail = None;
    self
  }

  pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
    self.instance = Some(instance.into());
    self
  }

  pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.extensions.insert(key.into(), value.into());
    self
  }

  pub fn problem_type(&self) -> &str {
    &self.problem_type
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn status(&self) -> u16 {
    self.status
  }

  pub fn detail(&self) -> Option<&str> {
    self.detail.as_deref()
  }

  pub fn instance(&self) -> Option<&str> {
    self.instance.as_deref()
  }

  pub fn extensions(&self) -> &Map<String, Value> {
    &self.extensions
  }

  pub fn extensions_mut(&mut self) -> &mut Map<String, Value> {
    &mut self.extensions
  }

  /// The taxonomy class, if `type` is one of the canonical slugs.
  pub fn kind(&self) -> Option<ProblemKind> {
    ProblemKind::from_slug(&self.problem_type)
  }

  /// Serialize to the wire format as a JSON value.
  pub fn to_value(&self) -> Value {
    serde_json::to_value(self).unwrap_or(Value::Null)
  }
}

fn reason_phrase(status: u16) -> String {
  http::StatusCode::from_u16(status)
    .ok()
    .and_then(|s| s.canonical_reason())
    .unwrap_or("Unknown Error")
    .to_string()
}

impl Serialize for ProblemDetails {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(None)?;
    map.serialize_entry("type", &self.problem_type)?;
    map.serialize_entry("title", &self.title)?;
    map.serialize_entry("status", &self.status)?;
    if let Some(detail) = &self.detail {
      map.serialize_entry("detail", detail)?;
    }
    if let Some(instance) = &self.instance {
      map.serialize_entry("instance", instance)?;
    }
    for (key, value) in &self.extensions {
      if !RESERVED_KEYS.contains(&key.as_str()) {
        map.serialize_entry(key, value)?;
      }
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for ProblemDetails {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let mut members = Map::deserialize(deserializer)?;

    let mut take_string = |key: &str| -> Result<Option<String>, D::Error> {
      match members.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(de::Error::custom(format!(
          "problem member '{}' must be a string, got {}",
          key, other
        ))),
      }
    };

    let problem_type = take_string("type")?;
    let title = take_string("title")?;
    let detail = take_string("detail")?;
    let instance = take_string("instance")?;

    let status = match members.remove("status") {
      None | Some(Value::Null) => None,
      Some(value) => Some(
        value
          .as_u64()
          .and_then(|n| u16::try_from(n).ok())
          .ok_or_else(|| de::Error::custom("problem member 'status' must be an integer"))?,
      ),
    };

    let mut problem = Self::from_partial(PartialProblem {
      problem_type,
      title,
      status,
      detail: None,
      instance,
      extensions: members,
    });
    problem.detail = detail;
    Ok(problem)
  }
}
