use std::collections::BTreeMap;
use std::sync::Arc;

use hookt_workflow::Capability;

/// Capabilities available to `uses`, keyed by name.
#[derive(Clone, Default)]
pub struct Registry {
  capabilities: BTreeMap<String, Arc<dyn Capability>>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `capability`, replacing any previous one with the same name.
  pub fn register(&mut self, capability: Arc<dyn Capability>) -> &mut Self {
    self
      .capabilities
      .insert(capability.name().to_string(), capability);
    self
  }

  pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
    self.capabilities.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.capabilities.contains_key(name)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.capabilities.keys().map(String::as_str)
  }
}

impl FromIterator<Arc<dyn Capability>> for Registry {
  fn from_iter<I: IntoIterator<Item = Arc<dyn Capability>>>(iter: I) -> Self {
    let mut registry = Self::new();
    for capability in iter {
      registry.register(capability);
    }
    registry
  }
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_list().entries(self.names()).finish()
  }
}
