use conduit_problem::ProblemDetails;
use serde::de::DeserializeOwned;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FieldErrors, validation_problem};
use crate::schema::Schema;
use crate::selector::Selector;

/// One declared input field.
#[derive(Clone)]
pub struct ValidationField {
  pub name: String,
  pub selector: Selector,
  pub schema: Schema,
}

/// An ordered set of uniquely named fields.
#[derive(Clone, Default)]
pub struct ValidationSpec {
  fields: Vec<ValidationField>,
}

/// Outcome of [`ValidationSpec::validate`]. Serializes as
/// `{"ok": true, "data": {..}}` or `{"ok": false, "errors": {..}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
  Valid(ValidatedInput),
  Invalid(FieldErrors),
}

/// Data that passed validation. Contains exactly the declared fields that
/// produced a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatedInput(Map<String, Value>);

impl ValidationSpec {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declare a field. Declaring a name twice replaces the earlier
  /// declaration in place, so names stay unique.
  pub fn field(mut self, name: impl Into<String>, selector: Selector, schema: Schema) -> Self {
    let field = ValidationField {
      name: name.into(),
      selector,
      schema,
    };
    match self.fields.iter_mut().find(|f| f.name == field.name) {
      Some(existing) => *existing = field,
      None => self.fields.push(field),
    }
    self
  }

  pub fn fields(&self) -> &[ValidationField] {
    &self.fields
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  /// Run every field's selector and schema against `raw`.
  ///
  /// All failing fields are reported, not just the first.
  pub fn validate(&self, raw: &Value) -> ValidationResult {
    let mut data = Map::new();
    let mut errors = FieldErrors::new();

    for field in &self.fields {
      let candidate = field.selector.select(raw);
      let mut field_errors = Vec::new();
      let checked = field
        .schema
        .check(candidate.as_ref(), &field.name, &mut field_errors);

      if !field_errors.is_empty() {
        errors.insert(field.name.clone(), field_errors);
      } else if let Some(value) = checked {
        data.insert(field.name.clone(), value);
      }
    }

    if errors.is_empty() {
      ValidationResult::Valid(ValidatedInput(data))
    } else {
      ValidationResult::Invalid(errors)
    }
  }

  /// Tuple form: exactly one side is populated.
  pub fn parse(&self, raw: &Value) -> (Option<ValidatedInput>, Option<FieldErrors>) {
    match self.validate(raw) {
      ValidationResult::Valid(input) => (Some(input), None),
      ValidationResult::Invalid(errors) => (None, Some(errors)),
    }
  }

  /// Raising form: failures become a 400 `validation-failed` problem with
  /// the field-error map under `errors`.
  pub fn parse_or_problem(&self, raw: &Value) -> Result<ValidatedInput, ProblemDetails> {
    self.validate(raw).into_result()
  }
}

/// Free-function form of [`ValidationSpec::validate`].
pub fn validate(spec: &ValidationSpec, raw: &Value) -> ValidationResult {
  spec.validate(raw)
}

impl ValidationResult {
  pub fn is_ok(&self) -> bool {
    matches!(self, Self::Valid(_))
  }

  pub fn into_result(self) -> Result<ValidatedInput, ProblemDetails> {
    match self {
      Self::Valid(input) => Ok(input),
      Self::Invalid(errors) => Err(validation_problem(&errors)),
    }
  }
}

impl Serialize for ValidationResult {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("ValidationResult", 2)?;
    match self {
      Self::Valid(input) => {
        state.serialize_field("ok", &true)?;
        state.serialize_field("data", input)?;
      }
      Self::Invalid(errors) => {
        state.serialize_field("ok", &false)?;
        state.serialize_field("errors", errors)?;
      }
    }
    state.end()
  }
}

impl ValidatedInput {
  pub fn new(data: Map<String, Value>) -> Self {
    Self(data)
  }

  pub fn empty() -> Self {
    Self::default()
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.0.get(name)
  }

  pub fn get_str(&self, name: &str) -> Option<&str> {
    self.0.get(name).and_then(Value::as_str)
  }

  pub fn get_i64(&self, name: &str) -> Option<i64> {
    self.0.get(name).and_then(Value::as_i64)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  pub fn data(&self) -> &Map<String, Value> {
    &self.0
  }

  pub fn into_inner(self) -> Map<String, Value> {
    self.0
  }

  /// Convert into a typed struct.
  pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(self.0.clone()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorCode;
  use crate::schema::{integer, object, string};
  use crate::selector::{body_field, param, query};
  use serde_json::json;

  fn record_spec() -> ValidationSpec {
    ValidationSpec::new()
      .field("id", param("id"), string().uuid())
      .field("name", body_field("name"), string().min_len(1))
      .field("page_size", query("pageSize"), integer().min(1).max(100).default(20))
  }

  #[test]
  fn test_invalid_uuid_scenario() {
    let spec = ValidationSpec::new().field("id", param("id"), string().uuid());
    let result = spec.validate(&json!({"params": {"id": "not-a-uuid"}}));

    let ValidationResult::Invalid(errors) = result else {
      panic!("expected invalid");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors["id"][0].code, ErrorCode::InvalidString);
    assert_eq!(errors["id"][0].path, "id");
  }

  #[test]
  fn test_valid_data_has_exactly_declared_fields() {
    let id = uuid::Uuid::new_v4().to_string();
    let raw = json!({
      "params": {"id": id, "other": "x"},
      "query": {"pageSize": "5", "debug": "1"},
      "body": {"name": "widget", "admin": true},
    });

    let ValidationResult::Valid(input) = record_spec().validate(&raw) else {
      panic!("expected valid");
    };
    let keys: Vec<_> = input.keys().collect();
    assert_eq!(keys, vec!["id", "name", "page_size"]);
    assert_eq!(input.get_i64("page_size"), Some(5));
  }

  #[test]
  fn test_error_keys_are_exactly_failing_fields() {
    let raw = json!({
      "params": {"id": "nope"},
      "query": {"pageSize": "500"},
      "body": {"name": "ok"},
    });

    let ValidationResult::Invalid(errors) = record_spec().validate(&raw) else {
      panic!("expected invalid");
    };
    let keys: Vec<_> = errors.keys().cloned().collect();
    assert_eq!(keys, vec!["id".to_string(), "page_size".to_string()]);
    assert_eq!(errors["page_size"][0].code, ErrorCode::TooBig);
  }

  #[test]
  fn test_default_substituted_when_selector_finds_nothing() {
    let spec = ValidationSpec::new().field("page_size", query("pageSize"), integer().default(20));
    let (data, errors) = spec.parse(&json!({"query": {}}));

    assert!(errors.is_none());
    assert_eq!(data.unwrap().get_i64("page_size"), Some(20));
  }

  #[test]
  fn test_parse_populates_exactly_one_side() {
    let spec = ValidationSpec::new().field("id", param("id"), string().uuid());

    let (data, errors) = spec.parse(&json!({"params": {}}));
    assert!(data.is_none());
    assert_eq!(errors.unwrap()["id"][0].message, "Required");
  }

  #[test]
  fn test_parse_or_problem() {
    let spec = ValidationSpec::new().field("id", param("id"), string().uuid());
    let problem = spec
      .parse_or_problem(&json!({"params": {"id": "x"}}))
      .unwrap_err();

    assert_eq!(problem.status(), 400);
    assert_eq!(problem.problem_type(), "validation-failed");
    assert_eq!(problem.extensions()["errors"]["id"][0]["code"], "invalid_string");
    assert_eq!(problem.extensions()["errors"]["id"][0]["path"], "id");
  }

  #[test]
  fn test_nested_paths_keyed_by_top_field() {
    let spec = ValidationSpec::new().field(
      "address",
      body_field("address"),
      object([("city", string()), ("zip", integer())]),
    );

    let ValidationResult::Invalid(errors) =
      spec.validate(&json!({"body": {"address": {"city": 1, "zip": 2}}}))
    else {
      panic!("expected invalid");
    };
    assert_eq!(errors["address"][0].path, "address.city");
  }

  #[test]
  fn test_redeclared_field_replaces() {
    let spec = ValidationSpec::new()
      .field("id", param("id"), string())
      .field("id", param("id"), string().uuid());

    assert_eq!(spec.fields().len(), 1);
    assert!(!spec.validate(&json!({"params": {"id": "x"}})).is_ok());
  }

  #[test]
  fn test_result_serialization() {
    let spec = ValidationSpec::new().field("n", query("n"), integer());

    assert_eq!(
      serde_json::to_value(spec.validate(&json!({"query": {"n": "3"}}))).unwrap(),
      json!({"ok": true, "data": {"n": 3}})
    );
    let invalid = serde_json::to_value(spec.validate(&json!({"query": {"n": "x"}}))).unwrap();
    assert_eq!(invalid["ok"], false);
    assert_eq!(invalid["errors"]["n"][0]["code"], "invalid_type");
  }

  #[test]
  fn test_deserialize_typed_input() {
    #[derive(Deserialize)]
    struct Page {
      page_size: u32,
    }

    let spec = ValidationSpec::new().field("page_size", query("pageSize"), integer());
    let input = spec.parse_or_problem(&json!({"query": {"pageSize": "7"}})).unwrap();
    let page: Page = input.deserialize().unwrap();
    assert_eq!(page.page_size, 7);
  }
}
