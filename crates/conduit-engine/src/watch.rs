//! Supervisor for file-watch workflows.
//!
//! One supervisor runs per watch workflow. Every attempt opens a fresh
//! stream and starts a new handler invocation with its own controller. When
//! the stream ends, the handler returns or the supervisor is cancelled, the
//! controller is cancelled and the invocation awaited before anything else
//! happens, so a file never has two live consumers.

use std::io;
use std::sync::Arc;

use conduit_policy::PolicyContext;
use conduit_trigger::LineStream;
use conduit_workflow::{Binding, Workflow};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::events::{ExecutionEvent, ExecutionNotifier};

enum Stop {
  StreamEnded,
  HandlerReturned,
  Cancelled,
}

#[instrument(skip_all, fields(workflow_id = %workflow.id()))]
pub(crate) async fn supervise<N>(
  workflow: Arc<Workflow>,
  notifier: Arc<N>,
  cancel: CancellationToken,
) where
  N: ExecutionNotifier + ?Sized,
{
  let Binding::WatchFile {
    trigger,
    source,
    handler,
  } = workflow.binding()
  else {
    return;
  };
  let workflow_id = workflow.id().to_string();

  let mut ctx = PolicyContext::new(workflow.id());
  if let Err(e) = workflow.policies().run(&mut ctx).await {
    error!(error = %e, "watch_denied");
    notifier.notify(ExecutionEvent::WatchStopped { workflow_id });
    return;
  }

  let mut attempt: u32 = 0;
  loop {
    attempt += 1;

    let opened = tokio::select! {
      _ = cancel.cancelled() => break,
      opened = source.open() => opened,
    };

    match opened {
      Ok(lines) => {
        let invocation_id = uuid::Uuid::new_v4().to_string();
        let controller = cancel.child_token();
        let ended = CancellationToken::new();

        notifier.notify(ExecutionEvent::WatchStarted {
          invocation_id: invocation_id.clone(),
          workflow_id: workflow_id.clone(),
          attempt,
        });
        info!(file_path = %source.describe(), %invocation_id, attempt, "watch_started");

        let mut task = tokio::spawn({
          let handler = Arc::clone(handler);
          let lines = signal_end(lines, ended.clone());
          let controller = controller.clone();
          async move { handler.consume(lines, controller).await }
        });

        let (stop, joined) = tokio::select! {
          joined = &mut task => (Stop::HandlerReturned, Some(joined)),
          _ = ended.cancelled() => (Stop::StreamEnded, None),
          _ = cancel.cancelled() => (Stop::Cancelled, None),
        };

        controller.cancel();
        let joined = match joined {
          Some(joined) => joined,
          None => task.await,
        };

        let error = match joined {
          Ok(Ok(())) => None,
          Ok(Err(e)) => Some(e.to_string()),
          Err(e) => Some(format!("watch handler panicked: {}", e)),
        };
        match (&stop, &error) {
          (_, Some(e)) => warn!(%invocation_id, error = %e, "watch_ended"),
          (Stop::StreamEnded, None) => info!(%invocation_id, "watch_ended"),
          (Stop::HandlerReturned, None) => info!(%invocation_id, "watch_handler_returned"),
          (Stop::Cancelled, None) => debug!(%invocation_id, "watch_cancelled"),
        }
        notifier.notify(ExecutionEvent::WatchEnded {
          invocation_id,
          workflow_id: workflow_id.clone(),
          error,
        });
      }
      Err(e) => {
        warn!(file_path = %source.describe(), error = %e, attempt, "watch_open_failed");
      }
    }

    if cancel.is_cancelled() || !trigger.auto_restart {
      break;
    }

    tokio::select! {
      _ = cancel.cancelled() => break,
      _ = tokio::time::sleep(trigger.restart_delay()) => {}
    }

    notifier.notify(ExecutionEvent::WatchRestarted {
      workflow_id: workflow_id.clone(),
      attempt: attempt + 1,
    });
    info!(attempt = attempt + 1, "watch_restarted");
  }

  notifier.notify(ExecutionEvent::WatchStopped { workflow_id });
  info!("watch_stopped");
}

/// Fire `ended` once the handler has drained the stream.
fn signal_end(lines: LineStream, ended: CancellationToken) -> LineStream {
  let marker = futures::stream::once(async move {
    ended.cancel();
    None::<io::Result<String>>
  })
  .filter_map(futures::future::ready);

  LineStream::new(lines.chain(marker))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_signal_end_fires_after_last_line() {
    let ended = CancellationToken::new();
    let mut lines = signal_end(
      LineStream::from_lines(vec!["a".to_string()]),
      ended.clone(),
    );

    assert_eq!(lines.next_line().await.unwrap().unwrap(), "a");
    assert!(!ended.is_cancelled());
    assert!(lines.next_line().await.is_none());
    assert!(ended.is_cancelled());
  }
}
