use std::collections::HashMap;

use crate::identity::IdentitySubject;

/// Request-scoped state the policies of one invocation share.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
  workflow_id: String,
  method: Option<String>,
  path: Option<String>,
  headers: HashMap<String, String>,
  subject: Option<IdentitySubject>,
}

impl PolicyContext {
  pub fn new(workflow_id: impl Into<String>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      ..Default::default()
    }
  }

  /// Attach the originating request line.
  pub fn with_request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
    self.method = Some(method.into());
    self.path = Some(path.into());
    self
  }

  /// Attach request headers. Names are stored lowercase.
  pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
  {
    self.headers = headers
      .into_iter()
      .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
      .collect();
    self
  }

  pub fn with_subject(mut self, subject: IdentitySubject) -> Self {
    self.subject = Some(subject);
    self
  }

  pub fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  pub fn method(&self) -> Option<&str> {
    self.method.as_deref()
  }

  pub fn path(&self) -> Option<&str> {
    self.path.as_deref()
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .get(&name.to_ascii_lowercase())
      .map(String::as_str)
  }

  pub fn subject(&self) -> Option<&IdentitySubject> {
    self.subject.as_ref()
  }

  pub fn set_subject(&mut self, subject: IdentitySubject) {
    self.subject = Some(subject);
  }

  pub fn into_subject(self) -> Option<IdentitySubject> {
    self.subject
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let ctx = PolicyContext::new("wf").with_headers([("Authorization", "Bearer t")]);

    assert_eq!(ctx.header("authorization"), Some("Bearer t"));
    assert_eq!(ctx.header("AUTHORIZATION"), Some("Bearer t"));
    assert_eq!(ctx.header("content-type"), None);
  }
}
