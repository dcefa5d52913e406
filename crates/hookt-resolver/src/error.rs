use hookt_workflow::PluginError;
use thiserror::Error;

/// Errors that can occur while wiring a workflow.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// No capability is registered under this name.
  #[error("job {job_id:?}: plugin {name:?} not found")]
  NotFound { job_id: String, name: String },

  /// A step names a capability the job declares no instance of.
  #[error("job {job_id:?}: step {step_id:?} uses {uses:?}, but the job declares no such plugin")]
  Unbound {
    job_id: String,
    step_id: String,
    uses: String,
  },

  /// A plugin body was rejected by its capability.
  #[error("job {job_id:?}: error reading plugin {uses:?}: {source}")]
  Plugin {
    job_id: String,
    uses: String,
    #[source]
    source: PluginError,
  },

  /// A step body was rejected by its plugin.
  #[error("job {job_id:?}: {step_id}: error reading plugin {uses:?} step: {source}")]
  Step {
    job_id: String,
    step_id: String,
    uses: String,
    #[source]
    source: PluginError,
  },

  /// A plugin failed to initialise.
  #[error("job {job_id:?}: error initializing plugin {plugin:?}: {source}")]
  Init {
    job_id: String,
    plugin: String,
    #[source]
    source: PluginError,
  },
}
