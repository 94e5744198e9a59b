use std::collections::HashMap;
use std::error::Error;

use axum::body::Body;
use axum::extract::{Query, Request};
use axum::http::{HeaderMap, StatusCode, header};
use conduit_problem::{ProblemDetails, ProblemKind};
use conduit_trigger::{HttpEvent, HttpMethod};
use conduit_validation::{ErrorCode, FieldError, FieldErrors, validation_problem};
use http_body_util::LengthLimitError;
use serde_json::Value;

/// Convert an axum request into the engine's event.
///
/// JSON bodies (`application/json` or any `+json` type) are parsed, other
/// bodies are passed on as text. Fails with a problem when the request
/// cannot be represented: an unsupported method (404), a malformed query
/// string or JSON body (400), or a body over the size limit (413).
pub async fn into_event(request: Request) -> Result<HttpEvent, ProblemDetails> {
  let (parts, body) = request.into_parts();

  let method: HttpMethod = parts.method.as_str().parse().map_err(|_| {
    ProblemDetails::not_found(format!(
      "no workflow is bound to {} {}",
      parts.method,
      parts.uri.path()
    ))
  })?;

  let Query(query) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri).map_err(|e| {
    ProblemDetails::from_kind(ProblemKind::ValidationFailed, format!("malformed query string: {}", e))
  })?;

  let body = read_body(body, &parts.headers).await?;

  let mut event = HttpEvent::new(method, parts.uri.path()).with_body(body);
  event.query = query;
  event.headers = headers_to_map(&parts.headers);
  Ok(event)
}

fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
  let mut map: HashMap<String, String> = HashMap::new();
  for (name, value) in headers {
    let Ok(value) = value.to_str() else {
      continue;
    };
    map
      .entry(name.as_str().to_string())
      .and_modify(|existing| {
        existing.push_str(", ");
        existing.push_str(value);
      })
      .or_insert_with(|| value.to_string());
  }
  map
}

async fn read_body(body: Body, headers: &HeaderMap) -> Result<Value, ProblemDetails> {
  let bytes = axum::body::to_bytes(body, usize::MAX)
    .await
    .map_err(|e| match is_length_limit(&e) {
      true => ProblemDetails::new(StatusCode::PAYLOAD_TOO_LARGE.as_u16())
        .with_detail("request body exceeds the configured limit"),
      false => ProblemDetails::from_kind(
        ProblemKind::ValidationFailed,
        format!("failed to read request body: {}", e),
      ),
    })?;

  if bytes.is_empty() {
    return Ok(Value::Null);
  }

  if !is_json(headers) {
    return Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()));
  }

  serde_json::from_slice(&bytes).map_err(|e| {
    let mut errors = FieldErrors::new();
    errors.insert(
      "body".to_string(),
      vec![FieldError::new(
        ErrorCode::InvalidType,
        "body",
        format!("Malformed JSON: {}", e),
      )],
    );
    validation_problem(&errors)
  })
}

fn is_json(headers: &HeaderMap) -> bool {
  headers
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(';').next())
    .map(|mime| {
      let mime = mime.trim().to_ascii_lowercase();
      mime == "application/json" || mime.ends_with("+json")
    })
    .unwrap_or(false)
}

fn is_length_limit(error: &axum::Error) -> bool {
  let mut current: Option<&(dyn Error + 'static)> = Some(error);
  while let Some(e) = current {
    if e.is::<LengthLimitError>() {
      return true;
    }
    current = e.source();
  }
  false
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::Method;

  fn request(method: Method, uri: &str, content_type: Option<&str>, body: &str) -> Request {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(ct) = content_type {
      builder = builder.header(header::CONTENT_TYPE, ct);
    }
    builder.body(Body::from(body.to_string())).unwrap()
  }

  #[tokio::test]
  async fn test_json_request() {
    let event = into_event(request(
      Method::POST,
      "/records/notes?dryRun=true&tag=a%20b",
      Some("application/json; charset=utf-8"),
      r#"{"title":"hi"}"#,
    ))
    .await
    .unwrap();

    assert_eq!(event.method, HttpMethod::Post);
    assert_eq!(event.path, "/records/notes");
    assert_eq!(event.query["dryRun"], "true");
    assert_eq!(event.query["tag"], "a b");
    assert_eq!(event.body, serde_json::json!({"title": "hi"}));
    assert_eq!(event.header("content-type"), Some("application/json; charset=utf-8"));
  }

  #[tokio::test]
  async fn test_empty_body_is_null() {
    let event = into_event(request(Method::GET, "/health", None, ""))
      .await
      .unwrap();
    assert_eq!(event.body, Value::Null);
    assert!(event.query.is_empty());
  }

  #[tokio::test]
  async fn test_text_body_is_string() {
    let event = into_event(request(Method::POST, "/ingest", Some("text/plain"), "hello"))
      .await
      .unwrap();
    assert_eq!(event.body, Value::String("hello".to_string()));
  }

  #[tokio::test]
  async fn test_malformed_json_is_validation_failure() {
    let problem = into_event(request(
      Method::POST,
      "/records/notes",
      Some("application/json"),
      "{ nope",
    ))
    .await
    .unwrap_err();

    assert_eq!(problem.status(), 400);
    assert_eq!(problem.problem_type(), "validation-failed");
    assert_eq!(problem.extensions()["errors"]["body"][0]["code"], "invalid_type");
  }

  #[tokio::test]
  async fn test_unsupported_method_is_not_found() {
    let problem = into_event(request(Method::OPTIONS, "/health", None, ""))
      .await
      .unwrap_err();
    assert_eq!(problem.status(), 404);
  }

  #[test]
  fn test_is_json() {
    let mut headers = HeaderMap::new();
    assert!(!is_json(&headers));
    headers.insert(header::CONTENT_TYPE, "application/merge-patch+json".parse().unwrap());
    assert!(is_json(&headers));
    headers.insert(header::CONTENT_TYPE, "text/html".parse().unwrap());
    assert!(!is_json(&headers));
  }
}
