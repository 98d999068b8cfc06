use std::collections::VecDeque;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Watch-mode events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// A line typed on stdin
  Input(String),
  /// Stdin reached end of file
  InputClosed,
  /// One or more resources changed state
  Changed(Vec<&'static str>),
}

/// Merges stdin lines and resource state changes into one stream
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
  /// Events read ahead while merging changes
  pending: VecDeque<Event>,
}

impl EventHandler {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      tx,
      rx,
      pending: VecDeque::new(),
    }
  }

  /// Start reading lines from stdin.
  pub fn read_stdin(&self) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let mut lines = BufReader::new(tokio::io::stdin()).lines();
      loop {
        match lines.next_line().await {
          Ok(Some(line)) => {
            if tx.send(Event::Input(line)).is_err() {
              break;
            }
          }
          Ok(None) => {
            let _ = tx.send(Event::InputClosed);
            break;
          }
          Err(e) => {
            debug!(error = %e, "Failed to read stdin");
            let _ = tx.send(Event::InputClosed);
            break;
          }
        }
      }
    });
  }

  /// Emit `Event::Changed` every time `rx` sees a new value.
  pub fn forward_changes<T>(&self, name: &'static str, mut rx: watch::Receiver<T>)
  where
    T: Send + Sync + 'static,
  {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      while rx.changed().await.is_ok() {
        if tx.send(Event::Changed(vec![name])).is_err() {
          break;
        }
      }
    });
  }

  #[cfg(test)]
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event. Changes already queued behind a change are
  /// merged into it.
  pub async fn next(&mut self) -> Option<Event> {
    let event = match self.pending.pop_front() {
      Some(event) => event,
      None => self.rx.recv().await?,
    };
    let Event::Changed(mut names) = event else {
      return Some(event);
    };

    while let Ok(queued) = self.rx.try_recv() {
      match queued {
        Event::Changed(more) => {
          for name in more {
            if !names.contains(&name) {
              names.push(name);
            }
          }
        }
        other => self.pending.push_back(other),
      }
    }
    Some(Event::Changed(names))
  }
}
