use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::method::HttpMethod;

/// A parsed inbound request, as supplied by the HTTP transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpEvent {
  pub method: HttpMethod,
  /// Request path without the query string.
  pub path: String,
  /// Path parameters; filled in when the request is matched to a route.
  pub params: HashMap<String, String>,
  pub query: HashMap<String, String>,
  /// Parsed body, `Null` when absent.
  pub body: Value,
  /// Header names are lowercase.
  pub headers: HashMap<String, String>,
}

impl HttpEvent {
  pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      params: HashMap::new(),
      query: HashMap::new(),
      body: Value::Null,
      headers: HashMap::new(),
    }
  }

  pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.insert(key.into(), value.into());
    self
  }

  pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
    self.headers.insert(name.to_ascii_lowercase(), value.into());
    self
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = body;
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .get(&name.to_ascii_lowercase())
      .map(String::as_str)
  }

  /// The raw input the validation pipeline selects from:
  /// `{ params, query, body, headers }`.
  pub fn raw_input(&self) -> Value {
    fn to_map(m: &HashMap<String, String>) -> Map<String, Value> {
      m.iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
    }

    json!({
      "params": to_map(&self.params),
      "query": to_map(&self.query),
      "body": self.body,
      "headers": to_map(&self.headers),
    })
  }
}
