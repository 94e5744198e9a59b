use std::sync::Arc;

use async_trait::async_trait;
use conduit_problem::{HandlerError, ProblemDetails};
use serde_json::Value;
use tracing::debug;

use crate::context::PolicyContext;
use crate::identity::TokenVerifier;

/// An authorization predicate run before a workflow's handler.
///
/// Returning `Ok(false)` denies the invocation. Returning an error aborts it
/// with that error unchanged.
#[async_trait]
pub trait Policy: Send + Sync {
  /// Name used in logs and denial details.
  fn name(&self) -> &str;

  async fn evaluate(&self, ctx: &mut PolicyContext) -> Result<bool, HandlerError>;
}

struct Authenticated {
  verifier: Arc<dyn TokenVerifier>,
}

#[async_trait]
impl Policy for Authenticated {
  fn name(&self) -> &str {
    "authenticated"
  }

  async fn evaluate(&self, ctx: &mut PolicyContext) -> Result<bool, HandlerError> {
    if ctx.subject().is_some() {
      return Ok(true);
    }

    let verified = self
      .verifier
      .verify_token(ctx.header("authorization"))
      .await;

    match verified {
      Ok(subject) => {
        ctx.set_subject(subject);
        Ok(true)
      }
      Err(e) => {
        debug!(workflow_id = %ctx.workflow_id(), error = %e, "token verification failed");
        Ok(false)
      }
    }
  }
}

/// Require a verified identity. Attaches the subject to the context.
pub fn authenticated(verifier: Arc<dyn TokenVerifier>) -> Arc<dyn Policy> {
  Arc::new(Authenticated { verifier })
}

struct HasClaim {
  name: String,
  key: String,
  value: Value,
}

#[async_trait]
impl Policy for HasClaim {
  fn name(&self) -> &str {
    &self.name
  }

  async fn evaluate(&self, ctx: &mut PolicyContext) -> Result<bool, HandlerError> {
    Ok(
      ctx
        .subject()
        .and_then(|s| s.claim(&self.key))
        .is_some_and(|v| *v == self.value),
    )
  }
}

/// Require the subject's claim `key` to equal `value`.
pub fn has_claim(key: impl Into<String>, value: impl Into<Value>) -> Arc<dyn Policy> {
  let key = key.into();
  Arc::new(HasClaim {
    name: format!("has_claim({})", key),
    key,
    value: value.into(),
  })
}

struct HasRole {
  name: String,
  role: String,
}

#[async_trait]
impl Policy for HasRole {
  fn name(&self) -> &str {
    &self.name
  }

  async fn evaluate(&self, ctx: &mut PolicyContext) -> Result<bool, HandlerError> {
    Ok(ctx.subject().is_some_and(|s| s.has_role(&self.role)))
  }
}

/// Require `role` in the subject's `roles` claim.
pub fn has_role(role: impl Into<String>) -> Arc<dyn Policy> {
  let role = role.into();
  Arc::new(HasRole {
    name: format!("has_role({})", role),
    role,
  })
}

struct Consumes {
  name: String,
  mime: String,
}

#[async_trait]
impl Policy for Consumes {
  fn name(&self) -> &str {
    &self.name
  }

  async fn evaluate(&self, ctx: &mut PolicyContext) -> Result<bool, HandlerError> {
    let actual = ctx
      .header("content-type")
      .and_then(|ct| ct.split(';').next())
      .map(str::trim);

    match actual {
      Some(ct) if ct.eq_ignore_ascii_case(&self.mime) => Ok(true),
      other => Err(
        ProblemDetails::unsupported_media_type(format!(
          "expected content-type '{}', got '{}'",
          self.mime,
          other.unwrap_or("none")
        ))
        .into(),
      ),
    }
  }
}

/// Require the request content-type to be `mime` (parameters ignored).
/// Mismatches raise 415.
pub fn consumes(mime: impl Into<String>) -> Arc<dyn Policy> {
  let mime = mime.into();
  Arc::new(Consumes {
    name: format!("consumes({})", mime),
    mime,
  })
}

struct NotImplemented;

#[async_trait]
impl Policy for NotImplemented {
  fn name(&self) -> &str {
    "not_implemented"
  }

  async fn evaluate(&self, ctx: &mut PolicyContext) -> Result<bool, HandlerError> {
    Err(
      ProblemDetails::not_implemented(format!(
        "workflow '{}' is not implemented",
        ctx.workflow_id()
      ))
      .into(),
    )
  }
}

/// Stub out a registered endpoint with 501.
pub fn not_implemented() -> Arc<dyn Policy> {
  Arc::new(NotImplemented)
}

struct FnPolicy<F> {
  name: String,
  f: F,
}

#[async_trait]
impl<F> Policy for FnPolicy<F>
where
  F: Fn(&PolicyContext) -> bool + Send + Sync,
{
  fn name(&self) -> &str {
    &self.name
  }

  async fn evaluate(&self, ctx: &mut PolicyContext) -> Result<bool, HandlerError> {
    Ok((self.f)(ctx))
  }
}

/// A synchronous predicate over the context.
pub fn policy_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Policy>
where
  F: Fn(&PolicyContext) -> bool + Send + Sync + 'static,
{
  Arc::new(FnPolicy {
    name: name.into(),
    f,
  })
}
