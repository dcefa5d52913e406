//! hookt Builtin
//!
//! Plugins available to every workflow:
//!
//! - `event`: schedules messages from sibling sources to its steps and runs
//!   each step's match/pass/fail sensor against them
//! - `inline`: a source that publishes JSON values from a file and from its
//!   own configuration

pub mod event;
pub mod inline;

use std::sync::Arc;

use hookt_resolver::Registry;
use hookt_workflow::Capability;

pub use event::{EventCapability, EventConfig, Mode, StepConfig};
pub use inline::{InlineCapability, InlineConfig, PublishConfig};

/// Every built-in capability.
pub fn capabilities() -> Vec<Arc<dyn Capability>> {
  vec![
    Arc::new(EventCapability) as Arc<dyn Capability>,
    Arc::new(InlineCapability),
  ]
}

/// A registry holding every built-in capability.
pub fn registry() -> Registry {
  capabilities().into_iter().collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_registry_names() {
    let registry = registry();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["event", "inline"]);
  }
}
