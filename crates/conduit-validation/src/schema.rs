//! Schema checks.
//!
//! A [`Schema`] checks one candidate value and returns the value to store in
//! the validated data. Numeric and boolean schemas accept their string forms
//! (`"42"`, `"true"`) so query parameters can be declared with their real
//! types. Coercion only ever happens here, never in selectors.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{ErrorCode, FieldError};

type CustomCheck = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// A composable check for a single value.
#[derive(Clone)]
pub struct Schema {
  kind: SchemaKind,
  optional: bool,
  default: Option<Value>,
}

#[derive(Clone)]
enum SchemaKind {
  Any,
  String(StringRules),
  Integer(Bounds<i64>),
  Number(Bounds<f64>),
  Boolean,
  Object(Vec<(String, Schema)>),
  Array(Box<Schema>),
  Custom(CustomCheck),
}

#[derive(Clone, Default)]
struct StringRules {
  min_len: Option<usize>,
  max_len: Option<usize>,
  format: Option<StringFormat>,
  one_of: Option<Vec<String>>,
}

#[derive(Clone, Copy)]
enum StringFormat {
  Uuid,
  Email,
}

#[derive(Clone, Copy)]
struct Bounds<T> {
  min: Option<T>,
  max: Option<T>,
}

impl<T> Default for Bounds<T> {
  fn default() -> Self {
    Self {
      min: None,
      max: None,
    }
  }
}

/// Accept any present value unchanged.
pub fn any() -> Schema {
  Schema::of(SchemaKind::Any)
}

pub fn string() -> Schema {
  Schema::of(SchemaKind::String(StringRules::default()))
}

/// Whole numbers; numeric strings are parsed.
pub fn integer() -> Schema {
  Schema::of(SchemaKind::Integer(Bounds::default()))
}

/// Any finite number; numeric strings are parsed.
pub fn number() -> Schema {
  Schema::of(SchemaKind::Number(Bounds::default()))
}

/// Booleans; `"true"`/`"false"` strings in any case are parsed.
pub fn boolean() -> Schema {
  Schema::of(SchemaKind::Boolean)
}

/// An object with declared members. Undeclared members are dropped.
pub fn object<I, K>(fields: I) -> Schema
where
  I: IntoIterator<Item = (K, Schema)>,
  K: Into<String>,
{
  Schema::of(SchemaKind::Object(
    fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
  ))
}

pub fn array(item: Schema) -> Schema {
  Schema::of(SchemaKind::Array(Box::new(item)))
}

/// A check written as a closure. An `Err` message is reported with code
/// `custom`.
pub fn custom<F>(check: F) -> Schema
where
  F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
{
  Schema::of(SchemaKind::Custom(Arc::new(check)))
}

impl Schema {
  fn of(kind: SchemaKind) -> Self {
    Self {
      kind,
      optional: false,
      default: None,
    }
  }

  /// A missing value is not an error; the field is left out of the data.
  pub fn optional(mut self) -> Self {
    self.optional = true;
    self
  }

  /// A missing value is replaced by `value` before the check runs.
  pub fn default(mut self, value: impl Into<Value>) -> Self {
    self.default = Some(value.into());
    self
  }

  pub fn min_len(mut self, len: usize) -> Self {
    if let SchemaKind::String(rules) = &mut self.kind {
      rules.min_len = Some(len);
    }
    self
  }

  pub fn max_len(mut self, len: usize) -> Self {
    if let SchemaKind::String(rules) = &mut self.kind {
      rules.max_len = Some(len);
    }
    self
  }

  pub fn uuid(mut self) -> Self {
    if let SchemaKind::String(rules) = &mut self.kind {
      rules.format = Some(StringFormat::Uuid);
    }
    self
  }

  pub fn email(mut self) -> Self {
    if let SchemaKind::String(rules) = &mut self.kind {
      rules.format = Some(StringFormat::Email);
    }
    self
  }

  pub fn one_of<I, S>(mut self, allowed: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    if let SchemaKind::String(rules) = &mut self.kind {
      rules.one_of = Some(allowed.into_iter().map(Into::into).collect());
    }
    self
  }

  /// Inclusive lower bound for integer and number schemas.
  pub fn min(mut self, min: i64) -> Self {
    match &mut self.kind {
      SchemaKind::Integer(bounds) => bounds.min = Some(min),
      SchemaKind::Number(bounds) => bounds.min = Some(min as f64),
      _ => {}
    }
    self
  }

  /// Inclusive upper bound for integer and number schemas.
  pub fn max(mut self, max: i64) -> Self {
    match &mut self.kind {
      SchemaKind::Integer(bounds) => bounds.max = Some(max),
      SchemaKind::Number(bounds) => bounds.max = Some(max as f64),
      _ => {}
    }
    self
  }

  /// Check a candidate value.
  ///
  /// `None` means the selector found nothing. Failures are appended to
  /// `errors`; the returned value is what belongs in the validated data
  /// (`None` for an absent optional field or on failure).
  pub fn check(
    &self,
    value: Option<&Value>,
    path: &str,
    errors: &mut Vec<FieldError>,
  ) -> Option<Value> {
    let value = match value {
      Some(v) => v,
      None => match &self.default {
        Some(default) => default,
        None if self.optional => return None,
        None => {
          errors.push(FieldError::new(ErrorCode::InvalidType, path, "Required"));
          return None;
        }
      },
    };

    self.kind.check(value, path, errors)
  }
}

impl SchemaKind {
  fn check(&self, value: &Value, path: &str, errors: &mut Vec<FieldError>) -> Option<Value> {
    let before = errors.len();
    let checked = match self {
      SchemaKind::Any => Some(value.clone()),
      SchemaKind::String(rules) => check_string(rules, value, path, errors),
      SchemaKind::Integer(bounds) => check_integer(bounds, value, path, errors),
      SchemaKind::Number(bounds) => check_number(bounds, value, path, errors),
      SchemaKind::Boolean => check_boolean(value, path, errors),
      SchemaKind::Object(fields) => check_object(fields, value, path, errors),
      SchemaKind::Array(item) => check_array(item, value, path, errors),
      SchemaKind::Custom(check) => match check(value) {
        Ok(v) => Some(v),
        Err(message) => {
          errors.push(FieldError::new(ErrorCode::Custom, path, message));
          None
        }
      },
    };

    if errors.len() > before { None } else { checked }
  }
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

fn invalid_type(expected: &str, value: &Value, path: &str) -> FieldError {
  FieldError::new(
    ErrorCode::InvalidType,
    path,
    format!("Expected {}, received {}", expected, type_name(value)),
  )
}

fn check_string(
  rules: &StringRules,
  value: &Value,
  path: &str,
  errors: &mut Vec<FieldError>,
) -> Option<Value> {
  let Value::String(s) = value else {
    errors.push(invalid_type("string", value, path));
    return None;
  };

  let len = s.chars().count();
  if let Some(min) = rules.min_len
    && len < min
  {
    errors.push(FieldError::new(
      ErrorCode::TooSmall,
      path,
      format!("String must contain at least {} character(s)", min),
    ));
  }
  if let Some(max) = rules.max_len
    && len > max
  {
    errors.push(FieldError::new(
      ErrorCode::TooBig,
      path,
      format!("String must contain at most {} character(s)", max),
    ));
  }

  match rules.format {
    Some(StringFormat::Uuid) if uuid::Uuid::parse_str(s).is_err() => {
      errors.push(FieldError::new(ErrorCode::InvalidString, path, "Invalid uuid"));
    }
    Some(StringFormat::Email) if !looks_like_email(s) => {
      errors.push(FieldError::new(ErrorCode::InvalidString, path, "Invalid email"));
    }
    _ => {}
  }

  if let Some(allowed) = &rules.one_of
    && !allowed.iter().any(|a| a == s)
  {
    errors.push(FieldError::new(
      ErrorCode::InvalidEnumValue,
      path,
      format!(
        "Invalid enum value. Expected {}, received '{}'",
        allowed
          .iter()
          .map(|a| format!("'{}'", a))
          .collect::<Vec<_>>()
          .join(" | "),
        s
      ),
    ));
  }

  Some(value.clone())
}

fn looks_like_email(s: &str) -> bool {
  if s.chars().any(char::is_whitespace) {
    return false;
  }
  match s.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && !domain.contains('@')
        && domain
          .split_once('.')
          .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
    }
    None => false,
  }
}

fn check_integer(
  bounds: &Bounds<i64>,
  value: &Value,
  path: &str,
  errors: &mut Vec<FieldError>,
) -> Option<Value> {
  let parsed = match value {
    Value::Number(n) => n.as_i64(),
    Value::String(s) => s.trim().parse::<i64>().ok(),
    _ => None,
  };

  let Some(n) = parsed else {
    errors.push(invalid_type("integer", value, path));
    return None;
  };

  check_bounds(bounds, n, path, errors);
  Some(Value::Number(n.into()))
}

fn check_number(
  bounds: &Bounds<f64>,
  value: &Value,
  path: &str,
  errors: &mut Vec<FieldError>,
) -> Option<Value> {
  let parsed = match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  };

  let Some(number) = parsed.and_then(serde_json::Number::from_f64) else {
    errors.push(invalid_type("number", value, path));
    return None;
  };

  check_bounds(bounds, number.as_f64().unwrap_or_default(), path, errors);
  // Keep integral JSON numbers as they were sent.
  match value {
    Value::Number(original) => Some(Value::Number(original.clone())),
    _ => Some(Value::Number(number)),
  }
}

fn check_bounds<T>(bounds: &Bounds<T>, n: T, path: &str, errors: &mut Vec<FieldError>)
where
  T: PartialOrd + fmt::Display + Copy,
{
  if let Some(min) = bounds.min
    && n < min
  {
    errors.push(FieldError::new(
      ErrorCode::TooSmall,
      path,
      format!("Number must be greater than or equal to {}", min),
    ));
  }
  if let Some(max) = bounds.max
    && n > max
  {
    errors.push(FieldError::new(
      ErrorCode::TooBig,
      path,
      format!("Number must be less than or equal to {}", max),
    ));
  }
}

fn check_boolean(value: &Value, path: &str, errors: &mut Vec<FieldError>) -> Option<Value> {
  let parsed = match value {
    Value::Bool(b) => Some(*b),
    Value::String(s) => match s.to_lowercase().as_str() {
      "true" => Some(true),
      "false" => Some(false),
      _ => None,
    },
    _ => None,
  };

  match parsed {
    Some(b) => Some(Value::Bool(b)),
    None => {
      errors.push(invalid_type("boolean", value, path));
      None
    }
  }
}

fn check_object(
  fields: &[(String, Schema)],
  value: &Value,
  path: &str,
  errors: &mut Vec<FieldError>,
) -> Option<Value> {
  let Value::Object(members) = value else {
    errors.push(invalid_type("object", value, path));
    return None;
  };

  let mut out = Map::new();
  for (name, schema) in fields {
    let member_path = format!("{}.{}", path, name);
    if let Some(checked) = schema.check(members.get(name), &member_path, errors) {
      out.insert(name.clone(), checked);
    }
  }
  Some(Value::Object(out))
}

fn check_array(
  item: &Schema,
  value: &Value,
  path: &str,
  errors: &mut Vec<FieldError>,
) -> Option<Value> {
  let Value::Array(items) = value else {
    errors.push(invalid_type("array", value, path));
    return None;
  };

  let checked = items
    .iter()
    .enumerate()
    .filter_map(|(i, v)| item.check(Some(v), &format!("{}.{}", path, i), errors))
    .collect();
  Some(Value::Array(checked))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn run(schema: &Schema, value: Option<Value>) -> (Option<Value>, Vec<FieldError>) {
    let mut errors = Vec::new();
    let out = schema.check(value.as_ref(), "field", &mut errors);
    (out, errors)
  }

  #[test]
  fn test_required_missing() {
    let (out, errors) = run(&string(), None);
    assert!(out.is_none());
    assert_eq!(errors[0].code, ErrorCode::InvalidType);
    assert_eq!(errors[0].message, "Required");
  }

  #[test]
  fn test_optional_missing() {
    let (out, errors) = run(&string().optional(), None);
    assert!(out.is_none());
    assert!(errors.is_empty());
  }

  #[test]
  fn test_default_is_checked() {
    let (out, errors) = run(&integer().min(1).default(20), None);
    assert_eq!(out, Some(json!(20)));
    assert!(errors.is_empty());

    let (_, errors) = run(&integer().min(1).default(0), None);
    assert_eq!(errors[0].code, ErrorCode::TooSmall);
  }

  #[test]
  fn test_integer_coerces_numeric_strings() {
    let (out, errors) = run(&integer(), Some(json!("42")));
    assert_eq!(out, Some(json!(42)));
    assert!(errors.is_empty());

    let (out, errors) = run(&integer(), Some(json!("4.2")));
    assert!(out.is_none());
    assert_eq!(errors[0].message, "Expected integer, received string");
  }

  #[test]
  fn test_number_and_bounds() {
    let (out, _) = run(&number(), Some(json!("19.99")));
    assert_eq!(out, Some(json!(19.99)));

    let (_, errors) = run(&number().max(10), Some(json!(10.5)));
    assert_eq!(errors[0].code, ErrorCode::TooBig);
  }

  #[test]
  fn test_boolean_coercion() {
    assert_eq!(run(&boolean(), Some(json!("TRUE"))).0, Some(json!(true)));
    assert_eq!(run(&boolean(), Some(json!(false))).0, Some(json!(false)));
    assert_eq!(run(&boolean(), Some(json!("yes"))).1.len(), 1);
  }

  #[test]
  fn test_uuid_format() {
    let (_, errors) = run(&string().uuid(), Some(json!("not-a-uuid")));
    assert_eq!(errors[0].code, ErrorCode::InvalidString);
    assert_eq!(errors[0].path, "field");

    let id = uuid::Uuid::new_v4().to_string();
    let (out, errors) = run(&string().uuid(), Some(json!(id)));
    assert!(errors.is_empty());
    assert_eq!(out, Some(json!(id)));
  }

  #[test]
  fn test_email_format() {
    assert!(run(&string().email(), Some(json!("a@b.io"))).1.is_empty());
    assert_eq!(run(&string().email(), Some(json!("a@b"))).1.len(), 1);
    assert_eq!(run(&string().email(), Some(json!("a b@c.io"))).1.len(), 1);
  }

  #[test]
  fn test_string_collects_every_failure() {
    let schema = string().min_len(5).one_of(["alpha", "omega"]);
    let (out, errors) = run(&schema, Some(json!("beta")));

    assert!(out.is_none());
    let codes: Vec<_> = errors.iter().map(|e| e.code).collect();
    assert_eq!(codes, vec![ErrorCode::TooSmall, ErrorCode::InvalidEnumValue]);
  }

  #[test]
  fn test_object_drops_unknown_and_nests_paths() {
    let schema = object([
      ("city", string().min_len(1)),
      ("zip", integer()),
    ]);

    let (out, errors) = run(&schema, Some(json!({"city": "Oslo", "zip": "0150", "extra": 1})));
    assert!(errors.is_empty());
    assert_eq!(out, Some(json!({"city": "Oslo", "zip": 150})));

    let (_, errors) = run(&schema, Some(json!({"city": ""})));
    let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["field.city", "field.zip"]);
  }

  #[test]
  fn test_array_indexed_paths() {
    let (_, errors) = run(&array(integer()), Some(json!([1, "x", 3])));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "field.1");
  }

  #[test]
  fn test_null_is_not_missing() {
    let (_, errors) = run(&string().optional(), Some(Value::Null));
    assert_eq!(errors[0].message, "Expected string, received null");
  }

  #[test]
  fn test_custom_check() {
    let even = custom(|v| match v.as_i64() {
      Some(n) if n % 2 == 0 => Ok(v.clone()),
      _ => Err("must be even".to_string()),
    });

    assert!(run(&even, Some(json!(4))).1.is_empty());
    assert_eq!(run(&even, Some(json!(3))).1[0].code, ErrorCode::Custom);
  }
}
