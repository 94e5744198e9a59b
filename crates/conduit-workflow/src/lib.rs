//! Conduit Workflow
//!
//! A workflow binds a trigger to a handler through a policy list and an
//! optional validation spec. Workflows are collected in a [`RegistryBuilder`]
//! during startup and frozen into a [`Registry`], which is read-only for the
//! rest of the process.
//!
//! The handler contract depends on the trigger:
//! - [`HttpHandler`] runs once per request with validated input, an output
//!   builder, the optional identity subject and a cancellation token.
//! - [`WatchHandler`] runs once per stream attempt with the line stream and a
//!   cancellation controller.

mod error;
mod handler;
mod registry;
mod workflow;

pub use error::RegistryError;
pub use handler::{HttpHandler, WatchHandler, http_fn, watch_fn};
pub use registry::{HttpMatch, Registry, RegistryBuilder};
pub use workflow::{Binding, InvocationState, Workflow};
