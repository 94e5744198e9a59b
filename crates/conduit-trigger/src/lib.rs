//! Conduit Trigger
//!
//! A trigger declares which external event invokes a workflow. Each variant
//! comes with its own invocation contract:
//!
//! - [`HttpTrigger`]: one invocation per matching [`HttpEvent`]; the handler
//!   receives validated input, an output builder, the optional identity
//!   subject and a cancellation token.
//! - [`WatchFileTrigger`]: one long-lived invocation per registration; the
//!   handler receives a [`LineStream`] and a cancellation controller. A fresh
//!   stream is opened from a [`LineSource`] for every attempt.

mod event;
mod lines;
mod method;
mod path;
mod tail;
mod types;

pub use event::HttpEvent;
pub use lines::{LineSource, LineStream};
pub use method::HttpMethod;
pub use path::PathTemplate;
pub use tail::FileTail;
pub use types::{HttpTrigger, StartPosition, Trigger, TriggerError, WatchFileTrigger};
