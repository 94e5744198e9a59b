use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Members of a record that fields may not use.
pub(crate) const RESERVED_FIELDS: [&str; 3] = ["id", "kind", "createdAt"];

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
  pub id: String,
  pub kind: String,
  pub created_at: DateTime<Utc>,
  #[serde(flatten)]
  pub fields: Map<String, Value>,
}

impl Record {
  /// The value of a field, or of `id` / `kind`.
  pub fn get(&self, name: &str) -> Option<Value> {
    match name {
      "id" => Some(Value::String(self.id.clone())),
      "kind" => Some(Value::String(self.kind.clone())),
      _ => self.fields.get(name).cloned(),
    }
  }
}

/// Selects records of one kind by field equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
  pub kind: String,
  pub filters: BTreeMap<String, Value>,
  pub limit: Option<usize>,
  pub offset: usize,
}

impl Query {
  pub fn new(kind: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      ..Default::default()
    }
  }

  /// Shorthand for a lookup by id.
  pub fn by_id(kind: impl Into<String>, id: impl Into<String>) -> Self {
    let id: String = id.into();
    Self::new(kind).filter("id", id)
  }

  pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.filters.insert(field.into(), value.into());
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn offset(mut self, offset: usize) -> Self {
    self.offset = offset;
    self
  }

  /// Limit and offset for a 1-based page number.
  pub fn page(self, page_size: usize, page_no: usize) -> Self {
    let offset = page_no.saturating_sub(1).saturating_mul(page_size);
    self.limit(page_size).offset(offset)
  }

  pub fn matches(&self, record: &Record) -> bool {
    record.kind == self.kind
      && self
        .filters
        .iter()
        .all(|(field, expected)| record.get(field).as_ref() == Some(expected))
  }
}
