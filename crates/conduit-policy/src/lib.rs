//! Conduit Policy
//!
//! Policies are predicates over a request-scoped [`PolicyContext`]. An
//! [`Authorizer`] runs them strictly in order and stops at the first one that
//! denies or fails:
//!
//! - denial with no identity subject on the context raises 401,
//! - denial with a subject present raises 403,
//! - any error a policy returns propagates unchanged.
//!
//! The `authenticated` policy is the only one that writes to the context: it
//! attaches the [`IdentitySubject`] produced by the [`TokenVerifier`].

mod context;
mod identity;
mod pipeline;
mod policies;

pub use context::PolicyContext;
pub use identity::{IdentityError, IdentitySubject, StaticTokenVerifier, TokenVerifier};
pub use pipeline::{Authorizer, authorize};
pub use policies::{
  Policy, authenticated, consumes, has_claim, has_role, not_implemented, policy_fn,
};
