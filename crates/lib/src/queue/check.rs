use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{QueueError, SimpleQueue};

/// State a running check reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckState {
  #[serde(skip_serializing_if = "String::is_empty")]
  pub status: String,
  #[serde(skip_serializing_if = "is_zero")]
  pub progress: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub report: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub error: String,
}

fn is_zero(value: &f32) -> bool {
  *value == 0.0
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Check {
  pub id: String,
  pub state: CheckState,
}

/// Typed view of a [`SimpleQueue`] carrying check states keyed by check id.
#[derive(Debug, Clone)]
pub struct CheckQueue {
  queue: Arc<SimpleQueue>,
}

impl CheckQueue {
  pub fn new(queue: Arc<SimpleQueue>) -> Self {
    Self { queue }
  }

  pub fn enqueue(&self, check: &Check) -> Result<(), QueueError> {
    let payload = serde_json::to_string(&check.state)?;
    self.queue.enqueue(check.id.clone(), payload);
    Ok(())
  }

  /// Oldest check, or `None` when the queue is empty.
  pub fn dequeue(&self) -> Result<Option<Check>, QueueError> {
    let Some(message) = self.queue.dequeue() else {
      return Ok(None);
    };
    if message.payload.is_empty() {
      return Ok(None);
    }
    let state = serde_json::from_str(&message.payload)?;
    Ok(Some(Check {
      id: message.external_id,
      state,
    }))
  }
}
