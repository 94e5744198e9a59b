use conduit_problem::ProblemDetails;
use serde_json::Value;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// The single result of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
  /// A 2xx status and the handler's body, if any.
  Success { status: u16, body: Option<Value> },

  Failure(ProblemDetails),
}

impl Envelope {
  pub fn status(&self) -> u16 {
    match self {
      Envelope::Success { status, .. } => *status,
      Envelope::Failure(problem) => problem.status(),
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, Envelope::Success { .. })
  }

  pub fn problem(&self) -> Option<&ProblemDetails> {
    match self {
      Envelope::Failure(problem) => Some(problem),
      Envelope::Success { .. } => None,
    }
  }

  /// The success body. `None` for failures and bodiless successes.
  pub fn body(&self) -> Option<&Value> {
    match self {
      Envelope::Success { body, .. } => body.as_ref(),
      Envelope::Failure(_) => None,
    }
  }

  pub fn content_type(&self) -> &'static str {
    match self {
      Envelope::Success { .. } => JSON_CONTENT_TYPE,
      Envelope::Failure(_) => PROBLEM_CONTENT_TYPE,
    }
  }

  /// The serialized payload. Empty for a bodiless success.
  pub fn to_bytes(&self) -> Vec<u8> {
    match self {
      Envelope::Success { body: None, .. } => Vec::new(),
      Envelope::Success { body: Some(body), .. } => body.to_string().into_bytes(),
      Envelope::Failure(problem) => problem.to_value().to_string().into_bytes(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_success_accessors() {
    let envelope = Envelope::Success {
      status: 200,
      body: Some(json!({"status": "UP"})),
    };

    assert!(envelope.is_success());
    assert_eq!(envelope.status(), 200);
    assert_eq!(envelope.content_type(), "application/json");
    assert_eq!(envelope.to_bytes(), br#"{"status":"UP"}"#);
  }

  #[test]
  fn test_failure_serializes_problem() {
    let envelope = Envelope::Failure(ProblemDetails::unauthorized("missing token"));

    assert_eq!(envelope.status(), 401);
    assert_eq!(envelope.content_type(), "application/problem+json");
    let body: Value = serde_json::from_slice(&envelope.to_bytes()).unwrap();
    assert_eq!(body["title"], "Unauthorized");
    assert_eq!(body["status"], 401);
  }

  #[test]
  fn test_bodiless_success_is_empty() {
    let envelope = Envelope::Success {
      status: 204,
      body: None,
    };
    assert!(envelope.to_bytes().is_empty());
    assert!(envelope.body().is_none());
  }
}
