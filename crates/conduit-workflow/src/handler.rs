use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_output::{Envelope, Output};
use conduit_policy::IdentitySubject;
use conduit_problem::HandlerError;
use conduit_trigger::LineStream;
use conduit_validation::ValidatedInput;
use tokio_util::sync::CancellationToken;

/// Handler bound to an HTTP trigger.
///
/// `cancel` fires when the client goes away. Checking it is cooperative; the
/// engine never aborts a running handler.
#[async_trait]
pub trait HttpHandler: Send + Sync {
  async fn handle(
    &self,
    input: ValidatedInput,
    output: Output,
    subject: Option<IdentitySubject>,
    cancel: CancellationToken,
  ) -> Result<Envelope, HandlerError>;
}

/// Handler bound to a file-watch trigger.
///
/// Consumes `lines` until the stream ends or `controller` is cancelled.
/// Malformed lines are the handler's concern and must not end the loop.
#[async_trait]
pub trait WatchHandler: Send + Sync {
  async fn consume(
    &self,
    lines: LineStream,
    controller: CancellationToken,
  ) -> Result<(), HandlerError>;
}

struct HttpFn<F> {
  f: F,
}

#[async_trait]
impl<F, Fut> HttpHandler for HttpFn<F>
where
  F: Fn(ValidatedInput, Output, Option<IdentitySubject>, CancellationToken) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Envelope, HandlerError>> + Send + 'static,
{
  async fn handle(
    &self,
    input: ValidatedInput,
    output: Output,
    subject: Option<IdentitySubject>,
    cancel: CancellationToken,
  ) -> Result<Envelope, HandlerError> {
    (self.f)(input, output, subject, cancel).await
  }
}

/// Wrap an async closure as an [`HttpHandler`].
pub fn http_fn<F, Fut>(f: F) -> Arc<dyn HttpHandler>
where
  F: Fn(ValidatedInput, Output, Option<IdentitySubject>, CancellationToken) -> Fut
    + Send
    + Sync
    + 'static,
  Fut: Future<Output = Result<Envelope, HandlerError>> + Send + 'static,
{
  Arc::new(HttpFn { f })
}

struct WatchFn<F> {
  f: F,
}

#[async_trait]
impl<F, Fut> WatchHandler for WatchFn<F>
where
  F: Fn(LineStream, CancellationToken) -> Fut + Send + Sync,
  Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
  async fn consume(
    &self,
    lines: LineStream,
    controller: CancellationToken,
  ) -> Result<(), HandlerError> {
    (self.f)(lines, controller).await
  }
}

/// Wrap an async closure as a [`WatchHandler`].
pub fn watch_fn<F, Fut>(f: F) -> Arc<dyn WatchHandler>
where
  F: Fn(LineStream, CancellationToken) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
  Arc::new(WatchFn { f })
}
