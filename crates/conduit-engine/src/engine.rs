use std::sync::Arc;

use conduit_output::{Envelope, Output};
use conduit_policy::PolicyContext;
use conduit_problem::{HandlerError, ProblemDetails};
use conduit_trigger::HttpEvent;
use conduit_validation::ValidatedInput;
use conduit_workflow::{Binding, HttpMatch, InvocationState, Registry, Workflow};
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, field, info, instrument, warn};

use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::watch;

/// The workflow engine.
///
/// Generic over `N: ExecutionNotifier` to allow different notification
/// strategies. Cheap to clone; the registry and notifier are shared.
pub struct Engine<N: ExecutionNotifier = NoopNotifier> {
  registry: Arc<Registry>,
  notifier: Arc<N>,
}

impl<N: ExecutionNotifier> Clone for Engine<N> {
  fn clone(&self) -> Self {
    Self {
      registry: Arc::clone(&self.registry),
      notifier: Arc::clone(&self.notifier),
    }
  }
}

impl Engine<NoopNotifier> {
  /// An engine whose events are discarded.
  pub fn new(registry: Registry) -> Self {
    Self::with_notifier(registry, NoopNotifier)
  }
}

impl<N: ExecutionNotifier + 'static> Engine<N> {
  pub fn with_notifier(registry: Registry, notifier: N) -> Self {
    Self {
      registry: Arc::new(registry),
      notifier: Arc::new(notifier),
    }
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  /// Run one HTTP event through its workflow and return its envelope.
  ///
  /// Always yields exactly one envelope: a 404 when nothing matches, a
  /// problem when a policy, validation or the handler fails, otherwise the
  /// handler's success.
  #[instrument(
    skip(self, event, cancel),
    fields(
      method = %event.method,
      path = %event.path,
      workflow_id = field::Empty,
      invocation_id = field::Empty,
    )
  )]
  pub async fn dispatch(&self, mut event: HttpEvent, cancel: CancellationToken) -> Envelope {
    let output = Output::new().with_instance(event.path.clone());

    let Some(HttpMatch { workflow, params }) = self.registry.match_http(event.method, &event.path)
    else {
      debug!("route_not_found");
      return output.fail(ProblemDetails::not_found(format!(
        "no workflow is bound to {} {}",
        event.method, event.path
      )));
    };
    event.params = params;

    let invocation_id = uuid::Uuid::new_v4().to_string();
    let span = Span::current();
    span.record("workflow_id", workflow.id());
    span.record("invocation_id", invocation_id.as_str());

    self.notifier.notify(ExecutionEvent::InvocationStarted {
      invocation_id: invocation_id.clone(),
      workflow_id: workflow.id().to_string(),
    });
    debug!("invocation_started");

    let result = self
      .invoke(&workflow, &event, output.clone(), &invocation_id, cancel)
      .await;
    let envelope = output.settle(result);

    match &envelope {
      Envelope::Success { status, .. } => {
        self.transition(&invocation_id, InvocationState::Completed);
        self.notifier.notify(ExecutionEvent::InvocationCompleted {
          invocation_id,
          status: *status,
        });
        info!(status = *status, "invocation_completed");
      }
      Envelope::Failure(problem) => {
        self.transition(&invocation_id, InvocationState::Failed);
        self.notifier.notify(ExecutionEvent::InvocationFailed {
          invocation_id,
          status: problem.status(),
          error: problem.title().to_string(),
        });
        info!(status = problem.status(), problem_type = %problem.problem_type(), "invocation_failed");
      }
    }

    envelope
  }

  async fn invoke(
    &self,
    workflow: &Workflow,
    event: &HttpEvent,
    output: Output,
    invocation_id: &str,
    cancel: CancellationToken,
  ) -> Result<Envelope, HandlerError> {
    let Binding::Http { handler, .. } = workflow.binding() else {
      return Err(HandlerError::internal(format!(
        "workflow '{}' is not bound to an http trigger",
        workflow.id()
      )));
    };

    self.transition(invocation_id, InvocationState::PolicyCheck);
    let mut ctx = PolicyContext::new(workflow.id())
      .with_request(event.method.as_str(), event.path.as_str())
      .with_headers(event.headers.iter().map(|(k, v)| (k, v.clone())));
    workflow.policies().run(&mut ctx).await?;

    self.transition(invocation_id, InvocationState::Validating);
    let input = match workflow.validation() {
      Some(spec) => spec.parse_or_problem(&event.raw_input())?,
      None => ValidatedInput::empty(),
    };

    self.transition(invocation_id, InvocationState::Executing);
    handler
      .handle(input, output, ctx.into_subject(), cancel)
      .await
  }

  fn transition(&self, invocation_id: &str, state: InvocationState) {
    debug!(state = %state, "state_changed");
    self.notifier.notify(ExecutionEvent::StateChanged {
      invocation_id: invocation_id.to_string(),
      state,
    });
  }

  /// Supervise every watch workflow until `cancel` fires.
  ///
  /// Each workflow gets its own task; this resolves once all of them have
  /// stopped.
  pub async fn run_watchers(&self, cancel: CancellationToken) {
    let handles: Vec<_> = self
      .registry
      .watch_workflows()
      .map(|workflow| {
        tokio::spawn(watch::supervise(
          Arc::clone(workflow),
          Arc::clone(&self.notifier),
          cancel.child_token(),
        ))
      })
      .collect();

    info!(count = handles.len(), "watchers_started");

    for result in futures::future::join_all(handles).await {
      if let Err(e) = result {
        warn!(error = %e, "watcher_task_failed");
      }
    }
  }
}
