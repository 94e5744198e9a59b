//! Selectors extract a candidate value from the raw input.
//!
//! For HTTP workflows the raw input has the shape
//! `{ "params": {..}, "query": {..}, "body": .., "headers": {..} }`, which is
//! what the [`param`], [`query`], [`body`] and [`body_field`] helpers read.
//! Selectors never coerce; that is the schema's job.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

type SelectFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Extracts the value a field is checked against. `None` means absent.
#[derive(Clone)]
pub struct Selector {
  select: SelectFn,
  description: String,
}

impl Selector {
  /// Select by JSON pointer, e.g. `/params/id`.
  pub fn pointer(pointer: impl Into<String>) -> Self {
    let pointer = pointer.into();
    let description = pointer.clone();
    Self {
      select: Arc::new(move |raw| raw.pointer(&pointer).cloned()),
      description,
    }
  }

  /// Select with an arbitrary closure.
  pub fn from_fn<F>(f: F) -> Self
  where
    F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
  {
    Self {
      select: Arc::new(f),
      description: "<fn>".to_string(),
    }
  }

  pub fn select(&self, raw: &Value) -> Option<Value> {
    (self.select)(raw)
  }
}

impl fmt::Debug for Selector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Selector").field(&self.description).finish()
  }
}

fn escape(segment: &str) -> String {
  segment.replace('~', "~0").replace('/', "~1")
}

/// A named path parameter (`:id` in `/records/:id`).
pub fn param(name: &str) -> Selector {
  Selector::pointer(format!("/params/{}", escape(name)))
}

/// A query-string parameter.
pub fn query(name: &str) -> Selector {
  Selector::pointer(format!("/query/{}", escape(name)))
}

/// The whole request body. An absent or `null` body selects nothing.
pub fn body() -> Selector {
  Selector {
    select: Arc::new(|raw| raw.get("body").filter(|b| !b.is_null()).cloned()),
    description: "/body".to_string(),
  }
}

/// A top-level member of the request body.
pub fn body_field(name: &str) -> Selector {
  Selector::pointer(format!("/body/{}", escape(name)))
}

/// A request header, by lowercase name.
pub fn header(name: &str) -> Selector {
  Selector::pointer(format!("/headers/{}", escape(&name.to_ascii_lowercase())))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn raw() -> Value {
    json!({
      "params": {"id": "abc"},
      "query": {"pageSize": "10"},
      "body": {"name": "widget", "a/b": 1},
      "headers": {"content-type": "application/json"},
    })
  }

  #[test]
  fn test_helpers_select_from_raw_shape() {
    let raw = raw();
    assert_eq!(param("id").select(&raw), Some(json!("abc")));
    assert_eq!(query("pageSize").select(&raw), Some(json!("10")));
    assert_eq!(body_field("name").select(&raw), Some(json!("widget")));
    assert_eq!(body_field("a/b").select(&raw), Some(json!(1)));
    assert_eq!(header("Content-Type").select(&raw), Some(json!("application/json")));
  }

  #[test]
  fn test_missing_is_none() {
    let raw = raw();
    assert_eq!(param("nope").select(&raw), None);
    assert_eq!(body().select(&json!({"body": null})), None);
  }

  #[test]
  fn test_selectors_do_not_coerce() {
    assert_eq!(query("pageSize").select(&raw()), Some(json!("10")));
  }
}
