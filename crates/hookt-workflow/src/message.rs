use std::sync::Arc;

use serde_json::Value;

/// One observed event: its position in the source stream and its payload.
///
/// Cloning is cheap; the payload is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
  index: usize,
  payload: Arc<Value>,
}

impl Message {
  pub fn new(index: usize, payload: Value) -> Self {
    Self {
      index,
      payload: Arc::new(payload),
    }
  }

  pub fn index(&self) -> usize {
    self.index
  }

  /// Structured view used by path queries.
  pub fn payload(&self) -> &Value {
    &self.payload
  }

  pub fn shared_payload(&self) -> Arc<Value> {
    Arc::clone(&self.payload)
  }
}
