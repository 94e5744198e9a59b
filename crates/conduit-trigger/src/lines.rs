use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};

/// An asynchronous sequence of text lines, without their terminators.
///
/// The stream ends when its source ends (file truncated or removed, for a
/// tail). Consumers see `None` from [`LineStream::next_line`] at that point.
pub struct LineStream {
  inner: BoxStream<'static, io::Result<String>>,
}

impl LineStream {
  pub fn new<S>(stream: S) -> Self
  where
    S: Stream<Item = io::Result<String>> + Send + 'static,
  {
    Self {
      inner: stream.boxed(),
    }
  }

  /// A stream over a fixed set of lines. Ends after the last one.
  pub fn from_lines<I>(lines: I) -> Self
  where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
  {
    Self::new(futures::stream::iter(lines.into_iter().map(Ok)))
  }

  pub async fn next_line(&mut self) -> Option<io::Result<String>> {
    self.inner.next().await
  }
}

impl Stream for LineStream {
  type Item = io::Result<String>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.inner.poll_next_unpin(cx)
  }
}

impl fmt::Debug for LineStream {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LineStream").finish_non_exhaustive()
  }
}

/// Opens fresh line streams for a watch workflow.
///
/// Called once per attempt; a restarted workflow never reuses a stream.
#[async_trait]
pub trait LineSource: Send + Sync {
  /// Name used in logs, usually the file path.
  fn describe(&self) -> String;

  async fn open(&self) -> io::Result<LineStream>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_from_lines_ends() {
    let mut lines = LineStream::from_lines(vec!["a".to_string(), "b".to_string()]);

    assert_eq!(lines.next_line().await.unwrap().unwrap(), "a");
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "b");
    assert!(lines.next_line().await.is_none());
  }

  #[tokio::test]
  async fn test_usable_as_stream() {
    let lines = LineStream::from_lines(vec!["x".to_string(), "y".to_string()]);
    let collected: Vec<String> = lines.map(|l| l.unwrap()).collect().await;
    assert_eq!(collected, vec!["x", "y"]);
  }
}
