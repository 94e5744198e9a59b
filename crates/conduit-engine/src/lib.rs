//! Conduit Engine
//!
//! Drives registered workflows.
//!
//! ```text
//! HttpEvent ──► match ──► PolicyCheck ──► Validating ──► Executing ──► Envelope
//!                 │ no match: 404                              │
//!                 └────────────── failures settle to problem details ◄─┘
//!
//! WatchFile ──► supervisor ──► open stream ──► handler(lines, controller)
//!                   ▲                                   │ stream ended
//!                   └──── cancel + await, then reopen ◄─┘ (auto_restart)
//! ```
//!
//! HTTP dispatch is stateless per invocation and safe to run concurrently.
//! Each watch workflow gets one supervisor task, which guarantees at most one
//! live handler per file.

mod engine;
mod events;
mod watch;

pub use engine::Engine;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
