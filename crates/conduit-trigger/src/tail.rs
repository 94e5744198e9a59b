//! Follow a file's appended lines, `tail -f` style.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::debug;

use crate::lines::{LineSource, LineStream};
use crate::types::{StartPosition, WatchFileTrigger};

/// A [`LineSource`] over a file on disk.
///
/// At end of file the stream polls for growth. It ends when the file is
/// removed or shrinks below the read position. An unterminated last line is
/// held until its newline arrives.
#[derive(Debug, Clone)]
pub struct FileTail {
  path: PathBuf,
  start_at: StartPosition,
  poll_interval: Duration,
}

impl FileTail {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      start_at: StartPosition::default(),
      poll_interval: Duration::from_millis(250),
    }
  }

  pub fn from_trigger(trigger: &WatchFileTrigger) -> Self {
    Self {
      path: trigger.file_path.clone(),
      start_at: trigger.start_at,
      poll_interval: trigger.poll_interval(),
    }
  }

  pub fn with_start(mut self, start_at: StartPosition) -> Self {
    self.start_at = start_at;
    self
  }

  pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
    self.poll_interval = poll_interval;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

#[async_trait]
impl LineSource for FileTail {
  fn describe(&self) -> String {
    self.path.display().to_string()
  }

  async fn open(&self) -> io::Result<LineStream> {
    let mut file = File::open(&self.path).await?;
    let pos = match self.start_at {
      StartPosition::Beginning => 0,
      StartPosition::End => file.seek(SeekFrom::End(0)).await?,
    };

    let state = TailState {
      reader: BufReader::new(file),
      path: self.path.clone(),
      pos,
      pending: Vec::new(),
      poll_interval: self.poll_interval,
      done: false,
    };

    Ok(LineStream::new(futures::stream::unfold(
      state,
      |mut state| async move { state.next_line().await.map(|line| (line, state)) },
    )))
  }
}

struct TailState {
  reader: BufReader<File>,
  path: PathBuf,
  pos: u64,
  pending: Vec<u8>,
  poll_interval: Duration,
  done: bool,
}

impl TailState {
  async fn next_line(&mut self) -> Option<io::Result<String>> {
    if self.done {
      return None;
    }

    loop {
      let read = match self.reader.read_until(b'\n', &mut self.pending).await {
        Ok(n) => n,
        Err(e) => {
          self.done = true;
          return Some(Err(e));
        }
      };
      self.pos += read as u64;

      if self.pending.last() == Some(&b'\n') {
        let raw = std::mem::take(&mut self.pending);
        return Some(Ok(trim_line(&raw)));
      }

      match tokio::fs::metadata(&self.path).await {
        Ok(meta) if meta.len() >= self.pos => tokio::time::sleep(self.poll_interval).await,
        Ok(meta) => {
          debug!(file_path = %self.path.display(), len = meta.len(), pos = self.pos, "file_truncated");
          self.done = true;
          return None;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
          debug!(file_path = %self.path.display(), "file_removed");
          self.done = true;
          return None;
        }
        Err(e) => {
          self.done = true;
          return Some(Err(e));
        }
      }
    }
  }
}

fn trim_line(raw: &[u8]) -> String {
  let line = raw.strip_suffix(b"\n").unwrap_or(raw);
  let line = line.strip_suffix(b"\r").unwrap_or(line);
  String::from_utf8_lossy(line).into_owned()
}
