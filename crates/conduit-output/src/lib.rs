//! Conduit Output
//!
//! Every invocation ends in exactly one [`Envelope`]: a success carrying a
//! 2xx status and the handler's body verbatim, or a failure carrying a
//! [`ProblemDetails`]. Handlers build successes through [`Output`]; errors
//! they return are turned into failures by [`Output::settle`].

mod envelope;
mod output;

pub use envelope::{Envelope, JSON_CONTENT_TYPE, PROBLEM_CONTENT_TYPE};
pub use output::{Output, settle};
