//! hookt Config
//!
//! Serializable workflow documents, before any plugin is resolved.
//!
//! ```yaml
//! jobs:
//!   - id: orders                 # optional, defaults to "#job-N"
//!     plugins:
//!       - uses: inline
//!         id: source
//!         with: { publish: { file: events.json } }
//!       - uses: event
//!         with: { sources: [source], mode: sync }
//!     steps:
//!       - uses: event
//!         desc: order is accepted
//!         with:
//!           match: { .type: order }
//!           pass: { .status: accepted }
//! ```
//!
//! Documents may be YAML or JSON. Decoding is strict: unknown keys, reserved
//! (`#`-prefixed) identifiers and duplicate identifiers are rejected, and all
//! problems are reported in one [`ConfigError::Invalid`]. The `with` bodies
//! stay as raw JSON values for the owning plugin to decode.

mod duration;
mod engine;
mod error;
mod workflow;

use std::path::Path;

pub use duration::{DurationError, deserialize_opt as deserialize_duration_opt, parse_duration};
pub use engine::{DEFAULT_INACTIVE_TIMEOUT, EngineConfig};
pub use error::{ConfigError, Problem};
pub use workflow::{JobDef, PluginDef, RESERVED_PREFIX, StepDef, WorkflowDef, decode, parse_document};

/// Reads and decodes a workflow document from disk.
pub fn load(path: impl AsRef<Path>) -> Result<WorkflowDef, ConfigError> {
  let path = path.as_ref();
  let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  parse_document(&source)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "jobs:\n  - id: one").unwrap();
    let wf = load(file.path()).unwrap();
    assert_eq!(wf.jobs[0].id.as_deref(), Some("one"));
  }

  #[test]
  fn test_load_missing_file() {
    let err = load("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
  }
}
