//! Workflows the `conduit` binary registers at startup.

use std::sync::Arc;

use conduit_config::Config;
use conduit_output::{Envelope, Output};
use conduit_policy::{
  IdentitySubject, TokenVerifier, authenticated, authorize, consumes, not_implemented,
};
use conduit_problem::{HandlerError, ProblemDetails, ResultExt};
use conduit_store::{Query, Store, StoreError, paginate};
use conduit_trigger::{HttpMethod, HttpTrigger, LineStream, TriggerError, WatchFileTrigger};
use conduit_validation::{
  ErrorCode, FieldError, FieldErrors, ValidatedInput, ValidationSpec, schema, selector,
  validation_problem,
};
use conduit_workflow::{Registry, RegistryBuilder, Workflow, http_fn, watch_fn};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Record kind the JSON-lines ingest workflows write to.
pub const INGEST_KIND: &str = "ingest";

/// Register every built-in workflow plus one ingest workflow per configured
/// watch file.
pub fn registry(
  config: &Config,
  store: Arc<dyn Store>,
  verifier: Arc<dyn TokenVerifier>,
) -> anyhow::Result<Registry> {
  let mut builder = RegistryBuilder::new()
    .register(health()?)
    .register(me(verifier.clone())?)
    .register(list_records(store.clone())?)
    .register(get_record(store.clone())?)
    .register(create_record(store.clone(), verifier.clone())?)
    .register(update_record(store.clone(), verifier.clone())?)
    .register(delete_record(store.clone(), verifier)?)
    .register(reindex()?);

  for trigger in &config.watch {
    builder = builder.register(ingest(trigger.clone(), store.clone()));
  }

  Ok(builder.build()?)
}

fn kind_and_id() -> ValidationSpec {
  ValidationSpec::new()
    .field("kind", selector::param("kind"), schema::string().min_len(1))
    .field("id", selector::param("id"), schema::string().uuid())
}

/// The request body, required to be a JSON object.
fn object_body() -> schema::Schema {
  schema::custom(|value| match value {
    Value::Object(_) => Ok(value.clone()),
    _ => Err("Expected a JSON object".to_string()),
  })
}

fn health() -> Result<Workflow, TriggerError> {
  let workflow = Workflow::http(
    "health",
    HttpTrigger::new(HttpMethod::Get, "/health")?,
    http_fn(|_, output, _, _| async move { Ok(output.ok(json!({"status": "UP"}))) }),
  )
  .with_tag("system");

  Ok(workflow)
}

fn me(verifier: Arc<dyn TokenVerifier>) -> Result<Workflow, TriggerError> {
  let workflow = Workflow::http(
    "me",
    HttpTrigger::new(HttpMethod::Get, "/me")?,
    http_fn(|_, output, subject, _| async move {
      let claims = subject.map(|s: IdentitySubject| s.claims).unwrap_or_default();
      Ok(output.ok(claims))
    }),
  )
  .with_tag("identity")
  .with_policies(authorize([authenticated(verifier)]));

  Ok(workflow)
}

fn list_records(store: Arc<dyn Store>) -> Result<Workflow, TriggerError> {
  let workflow = Workflow::http(
    "list_records",
    HttpTrigger::new(HttpMethod::Get, "/records/:kind")?,
    http_fn(move |input, output, _, _| list(store.clone(), input, output)),
  )
  .with_tag("records")
  .with_validation(
    ValidationSpec::new()
      .field("kind", selector::param("kind"), schema::string().min_len(1))
      .field(
        "pageSize",
        selector::query("pageSize"),
        schema::integer()
          .default(DEFAULT_PAGE_SIZE)
          .min(1)
          .max(MAX_PAGE_SIZE),
      )
      .field(
        "pageNo",
        selector::query("pageNo"),
        schema::integer().default(1).min(1),
      ),
  );

  Ok(workflow)
}

async fn list(
  store: Arc<dyn Store>,
  input: ValidatedInput,
  output: Output,
) -> Result<Envelope, HandlerError> {
  let kind = input.get_str("kind").unwrap_or_default();
  let page_size = input
    .get_i64("pageSize")
    .and_then(|v| u64::try_from(v).ok())
    .unwrap_or(DEFAULT_PAGE_SIZE as u64);
  let page_no = input
    .get_i64("pageNo")
    .and_then(|v| u64::try_from(v).ok())
    .unwrap_or(1);

  let query = Query::new(kind);
  let total = store.count(&query).await.map_err(store_error)?;
  let records = store
    .execute(&query.page(page_size as usize, page_no as usize))
    .await
    .map_err(store_error)?;

  output.json(&paginate(page_size, page_no, total)(records))
}

fn get_record(store: Arc<dyn Store>) -> Result<Workflow, TriggerError> {
  let workflow = Workflow::http(
    "get_record",
    HttpTrigger::new(HttpMethod::Get, "/records/:kind/:id")?,
    http_fn(move |input, output, _, _| get(store.clone(), input, output)),
  )
  .with_tag("records")
  .with_validation(kind_and_id());

  Ok(workflow)
}

async fn get(
  store: Arc<dyn Store>,
  input: ValidatedInput,
  output: Output,
) -> Result<Envelope, HandlerError> {
  let (kind, id) = (
    input.get_str("kind").unwrap_or_default(),
    input.get_str("id").unwrap_or_default(),
  );

  let record = store
    .execute(&Query::by_id(kind, id).limit(1))
    .await
    .map_err(store_error)?
    .into_iter()
    .next()
    .ok_or_else(|| record_not_found(kind, id))?;

  output.json(&record)
}

fn create_record(
  store: Arc<dyn Store>,
  verifier: Arc<dyn TokenVerifier>,
) -> Result<Workflow, TriggerError> {
  let workflow = Workflow::http(
    "create_record",
    HttpTrigger::new(HttpMethod::Post, "/records/:kind")?,
    http_fn(move |input, output, _, _| create(store.clone(), input, output)),
  )
  .with_tag("records")
  .with_policies(authorize([
    authenticated(verifier),
    consumes("application/json"),
  ]))
  .with_validation(
    ValidationSpec::new()
      .field("kind", selector::param("kind"), schema::string().min_len(1))
      .field("fields", selector::body(), object_body()),
  );

  Ok(workflow)
}

async fn create(
  store: Arc<dyn Store>,
  input: ValidatedInput,
  output: Output,
) -> Result<Envelope, HandlerError> {
  let kind = input.get_str("kind").unwrap_or_default();
  let fields = body_fields(&input);

  let record = store
    .save_entity(kind, fields)
    .await
    .map_err(store_error)?;
  info!(kind = %record.kind, record_id = %record.id, "record_created");

  Ok(output.created(serde_json::to_value(&record).or_internal()?))
}

fn update_record(
  store: Arc<dyn Store>,
  verifier: Arc<dyn TokenVerifier>,
) -> Result<Workflow, TriggerError> {
  let workflow = Workflow::http(
    "update_record",
    HttpTrigger::new(HttpMethod::Patch, "/records/:kind/:id")?,
    http_fn(move |input, output, _, _| update(store.clone(), input, output)),
  )
  .with_tag("records")
  .with_policies(authorize([
    authenticated(verifier),
    consumes("application/json"),
  ]))
  .with_validation(kind_and_id().field("fields", selector::body(), object_body()));

  Ok(workflow)
}

async fn update(
  store: Arc<dyn Store>,
  input: ValidatedInput,
  output: Output,
) -> Result<Envelope, HandlerError> {
  let (kind, id) = (
    input.get_str("kind").unwrap_or_default(),
    input.get_str("id").unwrap_or_default(),
  );
  let query = Query::by_id(kind, id);

  let changed = store
    .patch_entity(&query, body_fields(&input))
    .await
    .map_err(store_error)?;
  if changed == 0 {
    return Err(record_not_found(kind, id).into());
  }

  let record = store
    .execute(&query)
    .await
    .map_err(store_error)?
    .into_iter()
    .next()
    .ok_or_else(|| record_not_found(kind, id))?;

  output.json(&record)
}

fn delete_record(
  store: Arc<dyn Store>,
  verifier: Arc<dyn TokenVerifier>,
) -> Result<Workflow, TriggerError> {
  let workflow = Workflow::http(
    "delete_record",
    HttpTrigger::new(HttpMethod::Delete, "/records/:kind/:id")?,
    http_fn(move |input, output, _, _| delete(store.clone(), input, output)),
  )
  .with_tag("records")
  .with_policies(authorize([authenticated(verifier)]))
  .with_validation(kind_and_id());

  Ok(workflow)
}

async fn delete(
  store: Arc<dyn Store>,
  input: ValidatedInput,
  output: Output,
) -> Result<Envelope, HandlerError> {
  let (kind, id) = (
    input.get_str("kind").unwrap_or_default(),
    input.get_str("id").unwrap_or_default(),
  );

  let removed = store
    .remove_entity(&Query::by_id(kind, id))
    .await
    .map_err(store_error)?;
  if removed == 0 {
    return Err(record_not_found(kind, id).into());
  }

  info!(kind, record_id = id, "record_deleted");
  Ok(output.no_content())
}

fn reindex() -> Result<Workflow, TriggerError> {
  let workflow = Workflow::http(
    "reindex",
    HttpTrigger::new(HttpMethod::Post, "/admin/reindex")?,
    http_fn(|_, output, _, _| async move { Ok(output.no_content()) }),
  )
  .with_tag("admin")
  .with_policies(authorize([not_implemented()]));

  Ok(workflow)
}

fn ingest(trigger: WatchFileTrigger, store: Arc<dyn Store>) -> Workflow {
  let id = format!("ingest:{}", trigger.file_path.display());
  let file_path = trigger.file_path.display().to_string();

  Workflow::watch_file(
    id,
    trigger,
    watch_fn(move |lines, controller| {
      consume_json_lines(store.clone(), file_path.clone(), lines, controller)
    }),
  )
  .with_tag("ingest")
}

/// Read JSON lines until the stream ends or `controller` fires. Lines that
/// are not JSON are logged as `null` and skipped; objects are stored.
async fn consume_json_lines(
  store: Arc<dyn Store>,
  file_path: String,
  mut lines: LineStream,
  controller: CancellationToken,
) -> Result<(), HandlerError> {
  loop {
    let next = tokio::select! {
      _ = controller.cancelled() => break,
      next = lines.next_line() => next,
    };
    let Some(line) = next else {
      break;
    };
    let line = line.or_internal()?;
    if line.trim().is_empty() {
      continue;
    }

    let parsed: Value = serde_json::from_str(&line).unwrap_or(Value::Null);
    info!(file_path = %file_path, parsed = %parsed, "line_ingested");

    let Value::Object(fields) = parsed else {
      continue;
    };
    match store.save_entity(INGEST_KIND, fields).await {
      Ok(record) => debug!(record_id = %record.id, "ingest_record_saved"),
      Err(error) => warn!(file_path = %file_path, error = %error, "ingest_record_rejected"),
    }
  }
  Ok(())
}

fn body_fields(input: &ValidatedInput) -> Map<String, Value> {
  input
    .get("fields")
    .and_then(Value::as_object)
    .cloned()
    .unwrap_or_default()
}

fn record_not_found(kind: &str, id: &str) -> ProblemDetails {
  ProblemDetails::not_found(format!("no {} record with id {}", kind, id))
}

fn store_error(error: StoreError) -> HandlerError {
  match error {
    StoreError::ReservedField(field) => {
      let path = format!("fields.{}", field);
      let mut errors = FieldErrors::new();
      errors.insert(
        "fields".to_string(),
        vec![FieldError::new(
          ErrorCode::Custom,
          path,
          format!("'{}' is reserved", field),
        )],
      );
      validation_problem(&errors).into()
    }
    StoreError::InvalidKind(kind) => {
      let mut errors = FieldErrors::new();
      errors.insert(
        "kind".to_string(),
        vec![FieldError::new(
          ErrorCode::InvalidString,
          "kind",
          format!("'{}' is not a valid record kind", kind),
        )],
      );
      validation_problem(&errors).into()
    }
    other => HandlerError::internal(other),
  }
}
