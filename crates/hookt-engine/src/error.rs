use hookt_config::ConfigError;
use hookt_resolver::ResolveError;

use crate::engine::RunReport;

/// Errors returned by [`Engine::run`](crate::Engine::run).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// The workflow document is malformed.
  #[error(transparent)]
  Parse(#[from] ConfigError),

  /// A plugin or step could not be wired or initialised.
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("run cancelled")]
  Cancelled,

  /// Every step finished and at least one failed.
  #[error("{} of {} steps failed", .report.results.steps.failed, .report.total())]
  StepsFailed { report: Box<RunReport> },
}

impl EngineError {
  /// The report of a run that reached the end, if any.
  pub fn report(&self) -> Option<&RunReport> {
    match self {
      Self::StepsFailed { report } => Some(report),
      _ => None,
    }
  }
}
