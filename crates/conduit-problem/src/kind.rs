/// The failure classes every conduit endpoint can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemKind {
  /// Input failed the validation pipeline (400).
  ValidationFailed,
  /// No identity subject could be established (401).
  Unauthorized,
  /// An identity is present but a policy denied it (403).
  Forbidden,
  /// Raised explicitly by handlers for missing domain records (404).
  NotFound,
  /// Request content-type does not match what the workflow consumes (415).
  UnsupportedMediaType,
  /// Endpoint is registered but deliberately stubbed (501).
  NotImplemented,
  /// Catch-all for uncaught errors (500).
  Internal,
}

impl ProblemKind {
  pub const ALL: [ProblemKind; 7] = [
    ProblemKind::ValidationFailed,
    ProblemKind::Unauthorized,
    ProblemKind::Forbidden,
    ProblemKind::NotFound,
    ProblemKind::UnsupportedMediaType,
    ProblemKind::NotImplemented,
    ProblemKind::Internal,
  ];

  pub fn status(self) -> u16 {
    match self {
      ProblemKind::ValidationFailed => 400,
      ProblemKind::Unauthorized => 401,
      ProblemKind::Forbidden => 403,
      ProblemKind::NotFound => 404,
      ProblemKind::UnsupportedMediaType => 415,
      ProblemKind::NotImplemented => 501,
      ProblemKind::Internal => 500,
    }
  }

  /// The value written to the `type` member.
  pub fn slug(self) -> &'static str {
    match self {
      ProblemKind::ValidationFailed => "validation-failed",
      ProblemKind::Unauthorized => "unauthorized",
      ProblemKind::Forbidden => "forbidden",
      ProblemKind::NotFound => "not-found",
      ProblemKind::UnsupportedMediaType => "unsupported-media-type",
      ProblemKind::NotImplemented => "not-implemented",
      ProblemKind::Internal => "internal",
    }
  }

  pub fn title(self) -> &'static str {
    match self {
      ProblemKind::ValidationFailed => "Validation Failed",
      ProblemKind::Unauthorized => "Unauthorized",
      ProblemKind::Forbidden => "Forbidden",
      ProblemKind::NotFound => "Not Found",
      ProblemKind::UnsupportedMediaType => "Unsupported Media Type",
      ProblemKind::NotImplemented => "Not Implemented",
      ProblemKind::Internal => "Internal Server Error",
    }
  }

  /// Look up a kind by its `type` slug.
  pub fn from_slug(slug: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|kind| kind.slug() == slug)
  }
}
