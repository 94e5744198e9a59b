use std::fmt;
use std::sync::Arc;

use conduit_policy::Authorizer;
use conduit_trigger::{FileTail, HttpTrigger, LineSource, Trigger, WatchFileTrigger};
use conduit_validation::ValidationSpec;
use serde::{Deserialize, Serialize};

use crate::handler::{HttpHandler, WatchHandler};

/// A trigger paired with the handler that honours its invocation contract.
#[derive(Clone)]
pub enum Binding {
  Http {
    trigger: HttpTrigger,
    handler: Arc<dyn HttpHandler>,
  },
  WatchFile {
    trigger: WatchFileTrigger,
    /// Opens a fresh stream for every attempt.
    source: Arc<dyn LineSource>,
    handler: Arc<dyn WatchHandler>,
  },
}

/// A registered unit of work: trigger, policies, validation and handler.
#[derive(Clone)]
pub struct Workflow {
  id: String,
  tag: String,
  policies: Authorizer,
  validation: Option<ValidationSpec>,
  binding: Binding,
}

impl Workflow {
  pub fn http(id: impl Into<String>, trigger: HttpTrigger, handler: Arc<dyn HttpHandler>) -> Self {
    Self::new(id, Binding::Http { trigger, handler })
  }

  /// A watch workflow reading from the file named by `trigger`.
  pub fn watch_file(
    id: impl Into<String>,
    trigger: WatchFileTrigger,
    handler: Arc<dyn WatchHandler>,
  ) -> Self {
    let source = Arc::new(FileTail::from_trigger(&trigger));
    Self::new(
      id,
      Binding::WatchFile {
        trigger,
        source,
        handler,
      },
    )
  }

  fn new(id: impl Into<String>, binding: Binding) -> Self {
    Self {
      id: id.into(),
      tag: String::new(),
      policies: Authorizer::default(),
      validation: None,
      binding,
    }
  }

  pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
    self.tag = tag.into();
    self
  }

  pub fn with_policies(mut self, policies: Authorizer) -> Self {
    self.policies = policies;
    self
  }

  pub fn with_validation(mut self, validation: ValidationSpec) -> Self {
    self.validation = Some(validation);
    self
  }

  /// Replace the line source of a watch workflow. No effect on HTTP ones.
  pub fn with_source(mut self, new_source: Arc<dyn LineSource>) -> Self {
    if let Binding::WatchFile { source, .. } = &mut self.binding {
      *source = new_source;
    }
    self
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn tag(&self) -> &str {
    &self.tag
  }

  pub fn policies(&self) -> &Authorizer {
    &self.policies
  }

  pub fn validation(&self) -> Option<&ValidationSpec> {
    self.validation.as_ref()
  }

  pub fn binding(&self) -> &Binding {
    &self.binding
  }

  pub fn trigger(&self) -> Trigger {
    match &self.binding {
      Binding::Http { trigger, .. } => Trigger::Http(trigger.clone()),
      Binding::WatchFile { trigger, .. } => Trigger::WatchFile(trigger.clone()),
    }
  }
}

impl fmt::Debug for Workflow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Workflow")
      .field("id", &self.id)
      .field("tag", &self.tag)
      .field("trigger", &self.trigger())
      .field("policies", &self.policies)
      .field("validated", &self.validation.is_some())
      .finish()
  }
}

/// Per-invocation lifecycle.
///
/// `Registered` is the only resting state; the others are transient for a
/// single invocation. Watch invocations stay in `Executing` until their
/// stream ends or they are cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
  Registered,
  PolicyCheck,
  Validating,
  Executing,
  Completed,
  Failed,
}

impl InvocationState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, InvocationState::Completed | InvocationState::Failed)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      InvocationState::Registered => "registered",
      InvocationState::PolicyCheck => "policy_check",
      InvocationState::Validating => "validating",
      InvocationState::Executing => "executing",
      InvocationState::Completed => "completed",
      InvocationState::Failed => "failed",
    }
  }
}

impl fmt::Display for InvocationState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
