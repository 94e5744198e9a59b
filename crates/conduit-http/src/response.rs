use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use conduit_output::{Envelope, PROBLEM_CONTENT_TYPE};

/// Serialize an envelope. Bodiless successes carry no content type.
pub fn into_response(envelope: &Envelope) -> Response {
  let bytes = envelope.to_bytes();
  let has_body = !bytes.is_empty();

  let mut response = Response::new(Body::from(bytes));
  *response.status_mut() =
    StatusCode::from_u16(envelope.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
  if has_body {
    response.headers_mut().insert(
      header::CONTENT_TYPE,
      HeaderValue::from_static(envelope.content_type()),
    );
  }
  response
}

pub(crate) fn is_problem(response: &Response) -> bool {
  response
    .headers()
    .get(header::CONTENT_TYPE)
    .is_some_and(|v| v.as_bytes() == PROBLEM_CONTENT_TYPE.as_bytes())
}
