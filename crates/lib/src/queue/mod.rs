//! In-memory message queue for test harnesses.
//!
//! Messages are kept in FIFO order behind a mutex and exposed over a small
//! pull-based HTTP interface (see [`server`]). [`CheckQueue`] layers typed
//! check state messages on top.

mod check;
pub mod server;

pub use check::*;
pub use server::QueueServer;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
  #[error("failed to bind queue server to {addr}: {source}")]
  Bind {
    addr: String,
    #[source]
    source: std::io::Error,
  },

  #[error("queue server on {addr} failed: {source}")]
  Serve {
    addr: SocketAddr,
    #[source]
    source: std::io::Error,
  },

  #[error("queue server task failed: {0}")]
  Join(#[from] tokio::task::JoinError),

  #[error("invalid check payload: {0}")]
  Payload(#[from] serde_json::Error),
}

/// A queued message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub external_id: String,
  #[serde(rename = "Received", alias = "received")]
  pub received: DateTime<Utc>,
  pub payload: String,
}

/// FIFO of messages shared between request handlers.
#[derive(Debug, Default)]
pub struct SimpleQueue {
  messages: Mutex<VecDeque<Message>>,
}

impl SimpleQueue {
  pub fn new() -> Self {
    Self::default()
  }

  // A panic while holding the lock can't leave the deque half-updated.
  fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
    self.messages.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn enqueue(&self, external_id: impl Into<String>, payload: impl Into<String>) {
    self.lock().push_back(Message {
      external_id: external_id.into(),
      received: Utc::now(),
      payload: payload.into(),
    });
  }

  /// Oldest message, if any.
  pub fn dequeue(&self) -> Option<Message> {
    self.lock().pop_front()
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }
}
