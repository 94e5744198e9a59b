//! Conduit HTTP
//!
//! Bridges axum to the engine. There is no per-route table on the axum side:
//! a single fallback turns every request into an `HttpEvent`, lets the
//! engine match it against the workflow registry, and writes the resulting
//! envelope back.
//!
//! Middleware stack (outermost first):
//! 1. Payload-too-large rewrite into a problem body
//! 2. Request tracing
//! 3. Body size limit

mod request;
mod response;

use std::io;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use conduit_engine::{Engine, ExecutionNotifier};
use conduit_output::Envelope;
use conduit_problem::ProblemDetails;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::util::MapResponseLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub use request::into_event;
pub use response::into_response;

/// Error type for the HTTP transport.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
  #[error("failed to bind {addr}")]
  Bind {
    addr: SocketAddr,
    #[source]
    source: io::Error,
  },

  #[error("http server terminated")]
  Serve(#[source] io::Error),
}

/// An axum router that dispatches every request through `engine`.
pub fn router<N>(engine: Engine<N>, body_limit: usize) -> Router
where
  N: ExecutionNotifier + 'static,
{
  Router::new()
    .fallback(dispatch::<N>)
    .with_state(engine)
    .layer(RequestBodyLimitLayer::new(body_limit))
    .layer(TraceLayer::new_for_http())
    .layer(MapResponseLayer::new(rewrite_payload_too_large))
}

/// Serve `engine` on `bind` until `cancel` fires, then drain in-flight
/// requests.
pub async fn serve<N>(
  engine: Engine<N>,
  bind: SocketAddr,
  body_limit: usize,
  cancel: CancellationToken,
) -> Result<(), HttpError>
where
  N: ExecutionNotifier + 'static,
{
  let listener = TcpListener::bind(bind)
    .await
    .map_err(|source| HttpError::Bind { addr: bind, source })?;
  let local_addr = listener.local_addr().map_err(HttpError::Serve)?;

  info!(addr = %local_addr, routes = engine.registry().len(), "http_listening");

  axum::serve(listener, router(engine, body_limit))
    .with_graceful_shutdown(cancel.cancelled_owned())
    .await
    .map_err(HttpError::Serve)?;

  info!("http_stopped");
  Ok(())
}

async fn dispatch<N>(State(engine): State<Engine<N>>, request: Request) -> Response
where
  N: ExecutionNotifier + 'static,
{
  let event = match into_event(request).await {
    Ok(event) => event,
    Err(problem) => return into_response(&Envelope::Failure(problem)),
  };

  // Detached: a dropped request (client went away) only cancels the token.
  let cancel = CancellationToken::new();
  let guard = cancel.clone().drop_guard();
  let invocation = tokio::spawn(async move { engine.dispatch(event, cancel).await });
  let envelope = match invocation.await {
    Ok(envelope) => envelope,
    Err(e) => {
      error!(error = %e, "invocation_task_failed");
      Envelope::Failure(ProblemDetails::internal())
    }
  };
  guard.disarm();

  into_response(&envelope)
}

/// The body limit layer answers with a bare 413; give it a problem body.
fn rewrite_payload_too_large(response: Response) -> Response {
  if response.status() != StatusCode::PAYLOAD_TOO_LARGE || response::is_problem(&response) {
    return response;
  }

  let problem = ProblemDetails::new(StatusCode::PAYLOAD_TOO_LARGE.as_u16())
    .with_detail("request body exceeds the configured limit");
  into_response(&Envelope::Failure(problem))
}
