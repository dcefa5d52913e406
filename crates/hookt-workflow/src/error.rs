//! Plugin and step error types.

use std::time::Duration;

use hookt_pattern::{CompileError, MatchError};

/// Errors raised by plugins while being wired or initialised.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
  /// The plugin or step body could not be decoded.
  #[error("error reading {plugin:?} config: {message}")]
  Config { plugin: String, message: String },

  /// The plugin does not provide steps, or some other optional capability.
  #[error("plugin {plugin:?} does not support {what}")]
  Unsupported { plugin: String, what: String },

  /// A referenced sibling plugin is missing or unusable.
  #[error("source {source_id:?}: {message}")]
  Source { source_id: String, message: String },

  /// A subscriber was asked for a second subscription.
  #[error("plugin {plugin:?} already has a subscriber")]
  AlreadySubscribed { plugin: String },

  /// Initialisation failed for another reason.
  #[error("{message}")]
  Init { message: String },
}

impl PluginError {
  pub fn config(plugin: &str, err: impl std::fmt::Display) -> Self {
    Self::Config {
      plugin: plugin.to_string(),
      message: err.to_string(),
    }
  }

  pub fn init(err: impl std::fmt::Display) -> Self {
    Self::Init {
      message: err.to_string(),
    }
  }
}

/// Terminal error of a single step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
  #[error("step cancelled")]
  Cancelled,

  /// No qualifying message arrived within the inactivity window.
  #[error("step {step_id:?} has timed out after {after:?}")]
  Timeout { step_id: String, after: Duration },

  /// The fail group matched a message.
  #[error("step {step_id:?}: failure pattern matched")]
  FailureMatched { step_id: String },

  #[error("step {step_id:?}: {source}")]
  Compile {
    step_id: String,
    #[source]
    source: CompileError,
  },

  #[error("step {step_id:?}: {source}")]
  Match {
    step_id: String,
    #[source]
    source: MatchError,
  },

  /// The step's message channel closed before it reached a verdict.
  #[error("step {step_id:?}: event channel closed")]
  Closed { step_id: String },

  /// The step's task panicked or was aborted.
  #[error("step {step_id:?}: {message}")]
  Aborted { step_id: String, message: String },
}

impl StepError {
  /// Whether the step failed an assertion rather than failing to run.
  pub fn is_assertion(&self) -> bool {
    matches!(self, Self::Timeout { .. } | Self::FailureMatched { .. })
  }
}
