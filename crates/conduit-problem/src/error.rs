use crate::problem::ProblemDetails;

/// Boxed error for failures that are not problem details.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised by a policy or a workflow handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
  /// A problem that reaches the client unchanged.
  #[error(transparent)]
  Problem(#[from] ProblemDetails),

  /// Any other error. Reported to clients as a bare 500; the source is only
  /// ever logged.
  #[error("internal error: {0}")]
  Internal(#[source] BoxError),
}

impl HandlerError {
  /// Wrap an arbitrary error as an internal failure.
  pub fn internal(error: impl Into<BoxError>) -> Self {
    Self::Internal(error.into())
  }

  /// The problem carried by this error, if any.
  pub fn problem(&self) -> Option<&ProblemDetails> {
    match self {
      Self::Problem(problem) => Some(problem),
      Self::Internal(_) => None,
    }
  }
}

/// Convert foreign errors into [`HandlerError::Internal`] with `?`.
pub trait ResultExt<T> {
  fn or_internal(self) -> Result<T, HandlerError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<BoxError>,
{
  fn or_internal(self) -> Result<T, HandlerError> {
    self.map_err(HandlerError::internal)
  }
}
