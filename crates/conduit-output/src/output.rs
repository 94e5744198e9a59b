use std::error::Error;

use conduit_problem::{HandlerError, ProblemDetails};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::envelope::Envelope;

/// Builds the envelope for one invocation.
///
/// Passed to HTTP handlers. When an `instance` is set (the request path),
/// failure problems that lack one are stamped with it.
#[derive(Debug, Clone, Default)]
pub struct Output {
  instance: Option<String>,
}

impl Output {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
    self.instance = Some(instance.into());
    self
  }

  /// 200 with `body` as the payload.
  pub fn ok(&self, body: impl Into<Value>) -> Envelope {
    Envelope::Success {
      status: 200,
      body: Some(body.into()),
    }
  }

  /// 200 with any serializable body.
  pub fn json<T: Serialize>(&self, body: &T) -> Result<Envelope, HandlerError> {
    let body = serde_json::to_value(body).map_err(HandlerError::internal)?;
    Ok(self.ok(body))
  }

  /// 200 with no payload. The status marker for triggers without a response.
  pub fn ok_empty(&self) -> Envelope {
    Envelope::Success {
      status: 200,
      body: None,
    }
  }

  pub fn created(&self, body: impl Into<Value>) -> Envelope {
    Envelope::Success {
      status: 201,
      body: Some(body.into()),
    }
  }

  pub fn no_content(&self) -> Envelope {
    Envelope::Success {
      status: 204,
      body: None,
    }
  }

  /// A success with an explicit status, which must be 2xx.
  pub fn ok_with_status(
    &self,
    status: u16,
    body: Option<Value>,
  ) -> Result<Envelope, HandlerError> {
    if !(200..300).contains(&status) {
      return Err(HandlerError::internal(format!(
        "success status must be 2xx, got {}",
        status
      )));
    }
    Ok(Envelope::Success { status, body })
  }

  pub fn fail(&self, problem: ProblemDetails) -> Envelope {
    match &self.instance {
      Some(instance) if problem.instance().is_none() => {
        Envelope::Failure(problem.with_instance(instance.clone()))
      }
      _ => Envelope::Failure(problem),
    }
  }

  /// Turn a handler result into the invocation's envelope.
  ///
  /// Problems pass through unchanged. Internal errors are logged with their
  /// full source chain and replaced by a bare 500 without `detail`.
  pub fn settle(&self, result: Result<Envelope, HandlerError>) -> Envelope {
    match result {
      Ok(envelope) => envelope,
      Err(HandlerError::Problem(problem)) => self.fail(problem),
      Err(HandlerError::Internal(source)) => {
        error!(error = %source, chain = %error_chain(&*source), "handler_internal_error");
        self.fail(ProblemDetails::internal())
      }
    }
  }
}

/// [`Output::settle`] without an instance.
pub fn settle(result: Result<Envelope, HandlerError>) -> Envelope {
  Output::new().settle(result)
}

fn error_chain(error: &(dyn Error + 'static)) -> String {
  let mut chain = error.to_string();
  let mut source = error.source();
  while let Some(cause) = source {
    chain.push_str(": ");
    chain.push_str(&cause.to_string());
    source = cause.source();
  }
  chain
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_ok_is_idempotent() {
    let output = Output::new();
    let body = json!({"id": 7, "tags": ["a", "b"], "nested": {"z": 1, "a": 2}});

    let first = output.ok(body.clone());
    let second = output.ok(body);

    assert_eq!(first, second);
    assert_eq!(first.to_bytes(), second.to_bytes());
  }

  #[test]
  fn test_body_is_passed_verbatim() {
    let envelope = Output::new().ok(json!([1, 2, 3]));
    assert_eq!(envelope.body(), Some(&json!([1, 2, 3])));
  }

  #[test]
  fn test_json_serializes_structs() {
    #[derive(Serialize)]
    struct Health {
      status: &'static str,
    }

    let envelope = Output::new().json(&Health { status: "UP" }).unwrap();
    assert_eq!(envelope.body(), Some(&json!({"status": "UP"})));
  }

  #[test]
  fn test_ok_with_status_rejects_non_success() {
    let output = Output::new();
    assert_eq!(output.ok_with_status(202, None).unwrap().status(), 202);
    assert!(output.ok_with_status(404, None).is_err());
  }

  #[test]
  fn test_settle_passes_problems_through() {
    let problem = ProblemDetails::not_found("no such record").with_extension("kind", "notes");
    let envelope = settle(Err(problem.clone().into()));

    assert_eq!(envelope, Envelope::Failure(problem));
  }

  #[test]
  fn test_settle_coerces_internal_errors() {
    let envelope = settle(Err(HandlerError::internal("connection refused to db:5432")));

    let problem = envelope.problem().unwrap();
    assert_eq!(problem.status(), 500);
    assert_eq!(problem.title(), "Internal Server Error");
    assert!(problem.detail().is_none());

    let body = String::from_utf8(envelope.to_bytes()).unwrap();
    assert!(!body.contains("db:5432"));
    assert!(!body.contains("detail"));
  }

  #[test]
  fn test_fail_stamps_instance() {
    let output = Output::new().with_instance("/records/notes/1");

    let stamped = output.fail(ProblemDetails::not_found("gone"));
    assert_eq!(stamped.problem().and_then(|p| p.instance()), Some("/records/notes/1"));

    let kept = output.fail(ProblemDetails::not_found("gone").with_instance("/other"));
    assert_eq!(kept.problem().and_then(|p| p.instance()), Some("/other"));
  }

  #[test]
  fn test_error_chain() {
    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("query failed")
      }
    }

    impl Error for Outer {
      fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
      }
    }

    let err = Outer(std::io::Error::other("socket closed"));
    assert_eq!(error_chain(&err), "query failed: socket closed");
  }
}
