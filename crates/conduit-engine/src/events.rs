//! Execution events and notifiers for observability.
//!
//! The engine reports every invocation state transition and every watch
//! supervisor step. Consumers decide what to do with them.

use conduit_workflow::InvocationState;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted while dispatching and supervising workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// An HTTP request matched a workflow.
  InvocationStarted {
    invocation_id: String,
    workflow_id: String,
  },

  /// An invocation moved to a new state.
  StateChanged {
    invocation_id: String,
    state: InvocationState,
  },

  /// The invocation produced a success envelope.
  InvocationCompleted { invocation_id: String, status: u16 },

  /// The invocation produced a failure envelope.
  InvocationFailed {
    invocation_id: String,
    status: u16,
    error: String,
  },

  /// A watch handler was started on a fresh stream.
  WatchStarted {
    invocation_id: String,
    workflow_id: String,
    attempt: u32,
  },

  /// A watch handler returned or its stream ended.
  WatchEnded {
    invocation_id: String,
    workflow_id: String,
    error: Option<String>,
  },

  /// The supervisor is about to open a new stream.
  WatchRestarted { workflow_id: String, attempt: u32 },

  /// The supervisor exited and will not start another handler.
  WatchStopped { workflow_id: String },
}

/// Receives execution events.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls dispatch.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
