//! Conduit Problem
//!
//! Canonical error representation for every failure path in conduit. All
//! client-visible errors are [`ProblemDetails`] values serialized per
//! RFC 7807: the reserved members (`type`, `title`, `status`, `detail`,
//! `instance`) followed by the flattened extension members.
//!
//! Handlers and policies fail with [`HandlerError`], which either carries a
//! problem that passes through to the client unchanged, or an arbitrary
//! internal error that is coerced to a 500 at the output boundary.

mod error;
mod kind;
mod problem;

pub use error::{BoxError, HandlerError, ResultExt};
pub use kind::ProblemKind;
pub use problem::{PartialProblem, ProblemDetails, RESERVED_KEYS};
