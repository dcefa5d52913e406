//! Pattern compilation and evaluation errors.

use crate::query::QueryError;

/// A pattern group could not be compiled.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
  /// The group body is not a mapping.
  #[error("{group} pattern must be a mapping, got {kind}")]
  NotAMap { group: String, kind: &'static str },

  /// A key is not a valid path query.
  #[error("{group} pattern: failed to parse query {key:?}: {source}")]
  Query {
    group: String,
    key: String,
    #[source]
    source: QueryError,
  },

  /// A string literal is not a valid template.
  #[error("{group} pattern: failed to compile template for {key:?}: {message}")]
  Template {
    group: String,
    key: String,
    message: String,
  },

  /// Several keys failed; every failure is kept.
  #[error("{}", join(.0))]
  Multiple(Vec<CompileError>),
}

impl CompileError {
  /// Folds a list of errors into one, or `None` when the list is empty.
  pub fn join(mut errors: Vec<CompileError>) -> Option<CompileError> {
    match errors.len() {
      0 => None,
      1 => errors.pop(),
      _ => Some(CompileError::Multiple(
        errors
          .into_iter()
          .flat_map(|e| match e {
            CompileError::Multiple(inner) => inner,
            other => vec![other],
          })
          .collect(),
      )),
    }
  }
}

fn join(errors: &[CompileError]) -> String {
  errors
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

/// Evaluating a compiled group against a value failed.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
  #[error("{group} pattern: failed to run query {key:?}: {source}")]
  Query {
    group: String,
    key: String,
    #[source]
    source: QueryError,
  },

  #[error("{group} pattern: failed to evaluate template for {key:?}: {message}")]
  Render {
    group: String,
    key: String,
    message: String,
  },

  #[error("{group} pattern: failed to parse template output {output:?} for {key:?}: {message}")]
  Decode {
    group: String,
    key: String,
    output: String,
    message: String,
  },
}

#[cfg(test)]
mod tests {
  use super::*;

  fn template_err(key: &str) -> CompileError {
    CompileError::Template {
      group: "pass".into(),
      key: key.into(),
      message: "bad".into(),
    }
  }

  #[test]
  fn test_join_empty_is_none() {
    assert!(CompileError::join(Vec::new()).is_none());
  }

  #[test]
  fn test_join_single_is_unwrapped() {
    let err = CompileError::join(vec![template_err(".a")]).unwrap();
    assert!(matches!(err, CompileError::Template { .. }));
  }

  #[test]
  fn test_join_flattens_and_lists_all() {
    let nested = CompileError::Multiple(vec![template_err(".a"), template_err(".b")]);
    let err = CompileError::join(vec![nested, template_err(".c")]).unwrap();
    match &err {
      CompileError::Multiple(all) => assert_eq!(all.len(), 3),
      other => panic!("unexpected {other:?}"),
    }
    let text = err.to_string();
    assert!(text.contains("\".a\"") && text.contains("\".b\"") && text.contains("\".c\""));
  }
}
