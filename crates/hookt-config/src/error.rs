//! Configuration error types.

use std::fmt;
use std::path::PathBuf;

/// One problem found while decoding a document, located by a path such as
/// `jobs[0].steps[1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
  pub path: String,
  pub message: String,
}

impl Problem {
  pub fn new(path: &str, message: impl Into<String>) -> Self {
    Self {
      path: path.to_string(),
      message: message.into(),
    }
  }
}

impl fmt::Display for Problem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.path, self.message)
  }
}

/// Errors produced while reading or decoding a workflow document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// The document could not be read from disk.
  #[error("failed to read workflow {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The document is not valid YAML or JSON.
  #[error("error parsing workflow: {source}")]
  Syntax {
    #[from]
    source: serde_yaml_ng::Error,
  },

  /// The document parsed but does not describe a valid workflow.
  #[error("invalid workflow: {}", join(problems))]
  Invalid { problems: Vec<Problem> },
}

impl ConfigError {
  pub fn invalid(problems: Vec<Problem>) -> Self {
    Self::Invalid { problems }
  }

  /// Every decoding problem, empty for I/O and syntax errors.
  pub fn problems(&self) -> &[Problem] {
    match self {
      Self::Invalid { problems } => problems,
      _ => &[],
    }
  }
}

fn join(problems: &[Problem]) -> String {
  problems
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}
