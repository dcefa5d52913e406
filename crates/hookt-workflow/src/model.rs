use std::fmt;
use std::sync::Arc;

use crate::capability::{Plugin, Runner};

/// A wired workflow. Immutable once built.
#[derive(Debug, Default)]
pub struct Workflow {
  pub jobs: Vec<Job>,
}

impl Workflow {
  pub fn step_count(&self) -> usize {
    self.jobs.iter().map(|job| job.steps.len()).sum()
  }
}

#[derive(Debug)]
pub struct Job {
  pub id: String,
  pub plugins: Vec<PluginInstance>,
  pub steps: Vec<Step>,
}

impl Job {
  /// The plugin instance declared with identifier `id`.
  pub fn plugin(&self, id: &str) -> Option<&PluginInstance> {
    self.plugins.iter().find(|p| p.id.as_deref() == Some(id))
  }
}

pub struct PluginInstance {
  pub id: Option<String>,
  /// Name of the capability this instance was created from.
  pub uses: String,
  pub plugin: Arc<dyn Plugin>,
}

impl fmt::Debug for PluginInstance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PluginInstance")
      .field("id", &self.id)
      .field("uses", &self.uses)
      .finish_non_exhaustive()
  }
}

pub struct Step {
  pub id: String,
  pub desc: String,
  pub uses: String,
  pub runner: Arc<dyn Runner>,
}

impl fmt::Debug for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Step")
      .field("id", &self.id)
      .field("desc", &self.desc)
      .field("uses", &self.uses)
      .finish_non_exhaustive()
  }
}
