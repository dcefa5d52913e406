//! Execution events and notifiers.
//!
//! The engine reports run and step progress through an [`ExecutionNotifier`],
//! so callers can stream it to a UI or log without touching the engine.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted while a workflow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// The workflow was wired and its steps are about to start.
  RunStarted { run_id: String, steps: usize },

  StepStarted {
    run_id: String,
    job_id: String,
    step_id: String,
  },

  StepPassed {
    run_id: String,
    job_id: String,
    step_id: String,
  },

  StepFailed {
    run_id: String,
    job_id: String,
    step_id: String,
    error: String,
  },

  /// Every step passed.
  RunCompleted { run_id: String, passed: usize },

  /// The run could not be wired, was cancelled, or had failing steps.
  RunFailed { run_id: String, error: String },
}

/// Receives execution events. Called inline by the engine; keep it cheap.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded: a slow consumer must never stall step scheduling.
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

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_channel_notifier_forwards() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier = ChannelNotifier::new(tx);
    notifier.notify(ExecutionEvent::RunCompleted {
      run_id: "r".to_string(),
      passed: 2,
    });
    assert_eq!(
      rx.try_recv().unwrap(),
      ExecutionEvent::RunCompleted {
        run_id: "r".to_string(),
        passed: 2
      }
    );
  }

  #[test]
  fn test_channel_notifier_ignores_closed_receiver() {
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    ChannelNotifier::new(tx).notify(ExecutionEvent::RunFailed {
      run_id: "r".to_string(),
      error: "x".to_string(),
    });
  }
}
