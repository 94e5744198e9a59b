use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use conduit_engine::{ChannelNotifier, Engine, ExecutionEvent};
use conduit_output::Envelope;
use conduit_policy::{StaticTokenVerifier, authenticated, authorize};
use conduit_problem::{HandlerError, ProblemDetails};
use conduit_trigger::{HttpEvent, HttpMethod, HttpTrigger};
use conduit_validation::{ValidationSpec, schema, selector};
use conduit_workflow::{InvocationState, Registry, Workflow, http_fn};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn trigger(method: HttpMethod, path: &str) -> HttpTrigger {
  HttpTrigger::new(method, path).unwrap()
}

fn health() -> Workflow {
  Workflow::http(
    "health",
    trigger(HttpMethod::Get, "/health"),
    http_fn(|_, output, _, _| async move { Ok(output.ok(json!({"status": "UP"}))) }),
  )
}

fn verifier() -> Arc<StaticTokenVerifier> {
  Arc::new(StaticTokenVerifier::default().with_token(
    "secret",
    json!({"sub": "user-1"}).as_object().cloned().unwrap(),
  ))
}

fn me() -> Workflow {
  Workflow::http(
    "me",
    trigger(HttpMethod::Get, "/me"),
    http_fn(|_, output, subject, _| async move {
      Ok(output.ok(json!({ "sub": subject.and_then(|s| s.subject_id().map(str::to_string)) })))
    }),
  )
  .with_policies(authorize([authenticated(verifier())]))
}

fn body_of(envelope: &Envelope) -> Value {
  serde_json::from_slice(&envelope.to_bytes()).unwrap()
}

#[tokio::test]
async fn test_health_returns_up() {
  let engine = Engine::new(Registry::builder().register(health()).build().unwrap());

  let envelope = engine
    .dispatch(HttpEvent::new(HttpMethod::Get, "/health"), CancellationToken::new())
    .await;

  assert_eq!(
    envelope,
    Envelope::Success {
      status: 200,
      body: Some(json!({"status": "UP"})),
    }
  );
}

#[tokio::test]
async fn test_missing_authorization_is_unauthorized() {
  let engine = Engine::new(Registry::builder().register(me()).build().unwrap());

  let envelope = engine
    .dispatch(HttpEvent::new(HttpMethod::Get, "/me"), CancellationToken::new())
    .await;

  assert_eq!(envelope.status(), 401);
  assert_eq!(body_of(&envelope)["title"], "Unauthorized");
  assert_eq!(envelope.content_type(), "application/problem+json");
}

#[tokio::test]
async fn test_subject_reaches_handler() {
  let engine = Engine::new(Registry::builder().register(me()).build().unwrap());

  let event = HttpEvent::new(HttpMethod::Get, "/me").with_header("Authorization", "Bearer secret");
  let envelope = engine.dispatch(event, CancellationToken::new()).await;

  assert_eq!(envelope.body(), Some(&json!({"sub": "user-1"})));
}

#[tokio::test]
async fn test_validation_failure_never_reaches_handler() {
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let workflow = Workflow::http(
    "get_record",
    trigger(HttpMethod::Get, "/records/:id"),
    http_fn(move |input, output, _, _| {
      counter.fetch_add(1, Ordering::SeqCst);
      async move { Ok(output.ok(json!({"id": input.get_str("id")}))) }
    }),
  )
  .with_validation(ValidationSpec::new().field("id", selector::param("id"), schema::string().uuid()));
  let engine = Engine::new(Registry::builder().register(workflow).build().unwrap());

  let envelope = engine
    .dispatch(
      HttpEvent::new(HttpMethod::Get, "/records/not-a-uuid"),
      CancellationToken::new(),
    )
    .await;

  let body = body_of(&envelope);
  assert_eq!(envelope.status(), 400);
  assert_eq!(body["type"], "validation-failed");
  assert_eq!(body["errors"]["id"][0]["code"], "invalid_string");
  assert_eq!(body["errors"]["id"][0]["path"], "id");
  assert_eq!(calls.load(Ordering::SeqCst), 0);

  let ok = engine
    .dispatch(
      HttpEvent::new(HttpMethod::Get, "/records/0b7e3c1a-8f7d-4d1e-9b9a-2a4f5c6d7e8f"),
      CancellationToken::new(),
    )
    .await;
  assert_eq!(ok.status(), 200);
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_internal_errors_are_coerced_without_detail() {
  let workflow = Workflow::http(
    "broken",
    trigger(HttpMethod::Get, "/broken"),
    http_fn(|_, _, _, _| async move { Err(HandlerError::internal("pool exhausted: db-primary:5432")) }),
  );
  let engine = Engine::new(Registry::builder().register(workflow).build().unwrap());

  let envelope = engine
    .dispatch(HttpEvent::new(HttpMethod::Get, "/broken"), CancellationToken::new())
    .await;

  let body = body_of(&envelope);
  assert_eq!(envelope.status(), 500);
  assert_eq!(body["title"], "Internal Server Error");
  assert!(body.get("detail").is_none());
  assert!(!String::from_utf8(envelope.to_bytes()).unwrap().contains("db-primary"));
}

#[tokio::test]
async fn test_handler_problems_pass_through() {
  let workflow = Workflow::http(
    "missing",
    trigger(HttpMethod::Get, "/records/:kind/:id"),
    http_fn(|input, _, _, _| async move {
      Err(ProblemDetails::not_found(format!("no record {}", input.get_str("id").unwrap_or("?"))).into())
    }),
  )
  .with_validation(ValidationSpec::new().field("id", selector::param("id"), schema::string()));
  let engine = Engine::new(Registry::builder().register(workflow).build().unwrap());

  let envelope = engine
    .dispatch(
      HttpEvent::new(HttpMethod::Get, "/records/notes/42"),
      CancellationToken::new(),
    )
    .await;

  let body = body_of(&envelope);
  assert_eq!(envelope.status(), 404);
  assert_eq!(body["detail"], "no record 42");
  assert_eq!(body["instance"], "/records/notes/42");
}

#[tokio::test]
async fn test_unmatched_route_is_not_found() {
  let engine = Engine::new(Registry::builder().register(health()).build().unwrap());

  let wrong_path = engine
    .dispatch(HttpEvent::new(HttpMethod::Get, "/nope"), CancellationToken::new())
    .await;
  let wrong_method = engine
    .dispatch(HttpEvent::new(HttpMethod::Post, "/health"), CancellationToken::new())
    .await;

  assert_eq!(wrong_path.status(), 404);
  assert_eq!(wrong_method.status(), 404);
  assert_eq!(body_of(&wrong_path)["type"], "not-found");
}

#[tokio::test]
async fn test_static_route_preferred_over_template() {
  let by_id = Workflow::http(
    "by_id",
    trigger(HttpMethod::Get, "/users/:id"),
    http_fn(|_, output, _, _| async move { Ok(output.ok(json!("by_id"))) }),
  );
  let current = Workflow::http(
    "current",
    trigger(HttpMethod::Get, "/users/current"),
    http_fn(|_, output, _, _| async move { Ok(output.ok(json!("current"))) }),
  );
  let engine = Engine::new(
    Registry::builder()
      .register(by_id)
      .register(current)
      .build()
      .unwrap(),
  );

  let envelope = engine
    .dispatch(HttpEvent::new(HttpMethod::Get, "/users/current"), CancellationToken::new())
    .await;
  assert_eq!(envelope.body(), Some(&json!("current")));

  let envelope = engine
    .dispatch(HttpEvent::new(HttpMethod::Get, "/users/7"), CancellationToken::new())
    .await;
  assert_eq!(envelope.body(), Some(&json!("by_id")));
}

#[tokio::test]
async fn test_state_transitions_are_reported() {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let engine = Engine::with_notifier(
    Registry::builder().register(health()).register(me()).build().unwrap(),
    ChannelNotifier::new(tx),
  );

  engine
    .dispatch(HttpEvent::new(HttpMethod::Get, "/health"), CancellationToken::new())
    .await;

  let mut states = Vec::new();
  let mut completed = None;
  while let Ok(event) = rx.try_recv() {
    match event {
      ExecutionEvent::StateChanged { state, .. } => states.push(state),
      ExecutionEvent::InvocationCompleted { status, .. } => completed = Some(status),
      _ => {}
    }
  }
  assert_eq!(
    states,
    vec![
      InvocationState::PolicyCheck,
      InvocationState::Validating,
      InvocationState::Executing,
      InvocationState::Completed,
    ]
  );
  assert_eq!(completed, Some(200));

  engine
    .dispatch(HttpEvent::new(HttpMethod::Get, "/me"), CancellationToken::new())
    .await;

  let mut states = Vec::new();
  let mut failed = None;
  while let Ok(event) = rx.try_recv() {
    match event {
      ExecutionEvent::StateChanged { state, .. } => states.push(state),
      ExecutionEvent::InvocationFailed { status, .. } => failed = Some(status),
      _ => {}
    }
  }
  assert_eq!(states, vec![InvocationState::PolicyCheck, InvocationState::Failed]);
  assert_eq!(failed, Some(401));
}

#[tokio::test]
async fn test_handler_observes_cancellation() {
  let workflow = Workflow::http(
    "slow",
    trigger(HttpMethod::Get, "/slow"),
    http_fn(|_, output, _, cancel| async move {
      cancel.cancelled().await;
      Ok(output.ok(json!({"cancelled": true})))
    }),
  );
  let engine = Engine::new(Registry::builder().register(workflow).build().unwrap());

  let cancel = CancellationToken::new();
  let dispatch = tokio::spawn({
    let engine = engine.clone();
    let cancel = cancel.clone();
    async move {
      engine
        .dispatch(HttpEvent::new(HttpMethod::Get, "/slow"), cancel)
        .await
    }
  });

  cancel.cancel();
  let envelope = dispatch.await.unwrap();
  assert_eq!(envelope.body(), Some(&json!({"cancelled": true})));
}
