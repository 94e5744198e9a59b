use std::fmt;
use std::sync::Arc;

use conduit_problem::{HandlerError, ProblemDetails};
use tracing::{debug, warn};

use crate::context::PolicyContext;
use crate::policies::Policy;

/// An ordered policy list bound to one workflow.
#[derive(Clone, Default)]
pub struct Authorizer {
  policies: Vec<Arc<dyn Policy>>,
}

/// Compose policies into an [`Authorizer`]. Order is preserved.
pub fn authorize<I>(policies: I) -> Authorizer
where
  I: IntoIterator<Item = Arc<dyn Policy>>,
{
  Authorizer {
    policies: policies.into_iter().collect(),
  }
}

impl Authorizer {
  pub fn len(&self) -> usize {
    self.policies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.policies.is_empty()
  }

  pub fn names(&self) -> Vec<&str> {
    self.policies.iter().map(|p| p.name()).collect()
  }

  /// Run every policy in registration order against `ctx`.
  ///
  /// Stops at the first denial (401 without a subject, 403 with one) or at
  /// the first error, which is returned as-is. Later policies never run.
  pub async fn run(&self, ctx: &mut PolicyContext) -> Result<(), HandlerError> {
    for policy in &self.policies {
      let allowed = policy.evaluate(ctx).await.inspect_err(|e| {
        debug!(
          workflow_id = %ctx.workflow_id(),
          policy = %policy.name(),
          error = %e,
          "policy raised"
        );
      })?;

      if allowed {
        continue;
      }

      warn!(
        workflow_id = %ctx.workflow_id(),
        policy = %policy.name(),
        authenticated = ctx.subject().is_some(),
        "policy denied"
      );

      let problem = match ctx.subject() {
        None => ProblemDetails::unauthorized(format!(
          "policy '{}' requires an authenticated subject",
          policy.name()
        )),
        Some(_) => ProblemDetails::forbidden(format!("denied by policy '{}'", policy.name())),
      };
      return Err(problem.into());
    }

    Ok(())
  }
}

impl fmt::Debug for Authorizer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.names()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::identity::IdentitySubject;
  use crate::policies::policy_fn;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn counting(name: &str, result: bool, calls: Arc<AtomicUsize>) -> Arc<dyn Policy> {
    policy_fn(name.to_string(), move |_| {
      calls.fetch_add(1, Ordering::SeqCst);
      result
    })
  }

  #[tokio::test]
  async fn test_empty_pipeline_allows() {
    let mut ctx = PolicyContext::new("wf");
    assert!(authorize(Vec::new()).run(&mut ctx).await.is_ok());
  }

  #[tokio::test]
  async fn test_stops_at_first_denial_with_forbidden() {
    let p1 = Arc::new(AtomicUsize::new(0));
    let p2 = Arc::new(AtomicUsize::new(0));
    let p3 = Arc::new(AtomicUsize::new(0));

    let authorizer = authorize([
      counting("p1", true, p1.clone()),
      counting("p2", false, p2.clone()),
      counting("p3", true, p3.clone()),
    ]);
    let mut ctx = PolicyContext::new("wf").with_subject(IdentitySubject::default());

    let err = authorizer.run(&mut ctx).await.unwrap_err();

    assert_eq!(err.problem().map(|p| p.status()), Some(403));
    assert_eq!(p1.load(Ordering::SeqCst), 1);
    assert_eq!(p2.load(Ordering::SeqCst), 1);
    assert_eq!(p3.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_denial_without_subject_is_unauthorized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut ctx = PolicyContext::new("wf");

    let err = authorize([counting("deny", false, calls)])
      .run(&mut ctx)
      .await
      .unwrap_err();

    let problem = err.problem().unwrap();
    assert_eq!(problem.status(), 401);
    assert_eq!(problem.title(), "Unauthorized");
  }

  struct Exploding;

  #[derive(Debug, thiserror::Error)]
  #[error("store unavailable")]
  struct StoreDown;

  #[async_trait]
  impl Policy for Exploding {
    fn name(&self) -> &str {
      "exploding"
    }

    async fn evaluate(&self, _ctx: &mut PolicyContext) -> Result<bool, HandlerError> {
      Err(HandlerError::internal(StoreDown))
    }
  }

  #[tokio::test]
  async fn test_other_errors_propagate_unchanged() {
    let after = Arc::new(AtomicUsize::new(0));
    let mut ctx = PolicyContext::new("wf");

    let exploding: Arc<dyn Policy> = Arc::new(Exploding);
    let err = authorize([exploding, counting("after", true, after.clone())])
      .run(&mut ctx)
      .await
      .unwrap_err();

    assert!(matches!(err, HandlerError::Internal(_)));
    assert_eq!(err.to_string(), "internal error: store unavailable");
    assert_eq!(after.load(Ordering::SeqCst), 0);
  }
}
