//! Pattern groups: compiled maps of path query → predicate.

use std::sync::Arc;

use hookt_trace::{Scope, SharedObserver};
use minijinja::{Environment, Value as TemplateValue, context};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::compare::equal;
use crate::error::{CompileError, MatchError};
use crate::query::{Query, kind};
use crate::sensor::Sensor;
use crate::template::{TemplateOption, Templater};

#[derive(Debug, Clone)]
enum Predicate {
  /// `true` holds whenever the query yields a value, `false` never holds.
  Always(bool),
  /// Registered in the group's environment under the pattern key.
  Template { source: String },
  Literal(Value),
}

#[derive(Debug, Clone)]
struct Pattern {
  key: String,
  query: Query,
  predicate: Predicate,
}

impl Pattern {
  fn want(&self) -> Value {
    match &self.predicate {
      Predicate::Always(b) => Value::Bool(*b),
      Predicate::Template { source } => Value::String(source.clone()),
      Predicate::Literal(v) => v.clone(),
    }
  }
}

/// Outcome of one key of a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyOutcome {
  pub key: String,
  pub want: Value,
  /// `None` when the query yielded nothing.
  pub got: Option<Value>,
  pub ok: bool,
}

/// Result of evaluating a group. Evaluation stops at the first failing key,
/// so `keys` holds every passing key up to and including that one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupReport {
  pub matched: bool,
  pub keys: Vec<KeyOutcome>,
}

/// An ordered set of compiled predicates.
///
/// Keys are evaluated in lexical order of their query text. An empty group
/// matches every value.
pub struct PatternGroup {
  name: String,
  patterns: Vec<Pattern>,
  env: Arc<Environment<'static>>,
  observer: SharedObserver,
}

impl std::fmt::Debug for PatternGroup {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PatternGroup")
      .field("name", &self.name)
      .field("patterns", &self.patterns)
      .finish_non_exhaustive()
  }
}

impl PatternGroup {
  pub fn is_empty(&self) -> bool {
    self.patterns.is_empty()
  }

  /// Query strings in evaluation order.
  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.patterns.iter().map(|p| p.key.as_str())
  }

  pub fn matches(&self, scope: &Scope, value: &Value) -> Result<bool, MatchError> {
    Ok(self.evaluate(scope, value)?.matched)
  }

  /// Evaluates every predicate against `value`, stopping at the first miss.
  ///
  /// Only the first value a query yields is considered; a query that yields
  /// nothing fails the group.
  pub fn evaluate(&self, scope: &Scope, value: &Value) -> Result<GroupReport, MatchError> {
    let scope = scope.group(&self.name);
    let mut report = GroupReport {
      matched: true,
      keys: Vec::with_capacity(self.patterns.len()),
    };

    for pattern in &self.patterns {
      let scope = scope.pattern(&pattern.key);
      debug!(query = %pattern.query, group = %self.name, "pattern");

      let first = pattern
        .query
        .first(value)
        .map_err(|source| MatchError::Query {
          group: self.name.clone(),
          key: pattern.key.clone(),
          source,
        })?;

      let Some(got) = first else {
        report.matched = false;
        report.keys.push(KeyOutcome {
          key: pattern.key.clone(),
          want: pattern.want(),
          got: None,
          ok: false,
        });
        break;
      };

      let (want, ok) = match &pattern.predicate {
        Predicate::Always(b) => {
          let want = Value::Bool(*b);
          self.observer.equal_match(&scope, &want, &got, *b);
          (want, *b)
        }
        Predicate::Literal(want) => {
          let ok = equal(want, &got);
          self.observer.equal_match(&scope, want, &got, ok);
          (want.clone(), ok)
        }
        Predicate::Template { .. } => self.render(&scope, pattern, &got)?,
      };

      report.keys.push(KeyOutcome {
        key: pattern.key.clone(),
        want,
        got: Some(got),
        ok,
      });
      if !ok {
        report.matched = false;
        break;
      }
    }

    Ok(report)
  }

  fn render(&self, scope: &Scope, pattern: &Pattern, got: &Value) -> Result<(Value, bool), MatchError> {
    let rendered = self
      .env
      .get_template(&pattern.key)
      .and_then(|t| t.render(context! { value => TemplateValue::from_serialize(got) }));

    let output = match rendered {
      Ok(output) => {
        self.observer.execute_match(scope, &output, None);
        output
      }
      Err(e) => {
        let message = e.to_string();
        self.observer.execute_match(scope, "", Some(&message));
        return Err(MatchError::Render {
          group: self.name.clone(),
          key: pattern.key.clone(),
          message,
        });
      }
    };

    let want = match decode_output(&output) {
      Ok(want) => {
        self.observer.decode_match(scope, &output, None);
        want
      }
      Err(e) => {
        let message = e.to_string();
        self.observer.decode_match(scope, &output, Some(&message));
        return Err(MatchError::Decode {
          group: self.name.clone(),
          key: pattern.key.clone(),
          output,
          message,
        });
      }
    };

    if let Value::Bool(verdict) = want {
      return Ok((want, verdict));
    }
    let ok = equal(&want, got);
    self.observer.equal_match(scope, &want, got, ok);
    Ok((want, ok))
  }
}

fn decode_output(output: &str) -> Result<Value, serde_yaml_ng::Error> {
  if output.trim().is_empty() {
    return Ok(Value::Null);
  }
  serde_yaml_ng::from_str(output)
}

/// Compiles pattern groups and sensors.
///
/// This is the shared parsing handle plugins receive: it carries the run's
/// templater (and therefore its variables) plus the trace observer.
#[derive(Clone)]
pub struct Compiler {
  templater: Templater,
  observer: SharedObserver,
}

impl Compiler {
  pub fn new(templater: Templater, observer: SharedObserver) -> Self {
    Self { templater, observer }
  }

  pub fn templater(&self) -> &Templater {
    &self.templater
  }

  pub fn observer(&self) -> &SharedObserver {
    &self.observer
  }

  /// A compiler whose templates also see `options`.
  pub fn with_options(&self, options: impl IntoIterator<Item = TemplateOption>) -> Self {
    Self {
      templater: self.templater.with_options(options),
      observer: self.observer.clone(),
    }
  }

  /// Compiles `body` (a mapping of query → literal, or null) into a group.
  ///
  /// Every key is attempted; all failures are returned together.
  pub fn group(&self, scope: &Scope, name: &str, body: &Value) -> Result<PatternGroup, CompileError> {
    let mut entries: Vec<(String, Value)> = match body {
      Value::Null => Vec::new(),
      Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
      other => {
        return Err(CompileError::NotAMap {
          group: name.to_string(),
          kind: kind(other),
        });
      }
    };

    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let scope = scope.group(name);
    let mut env = self.templater.environment();
    let mut patterns = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();

    for (key, raw) in entries {
      let scope = scope.pattern(&key);

      let query = match Query::parse(&key) {
        Ok(query) => {
          self.observer.parse_key(&scope, None);
          query
        }
        Err(source) => {
          self.observer.parse_key(&scope, Some(&source.to_string()));
          errors.push(CompileError::Query {
            group: name.to_string(),
            key,
            source,
          });
          continue;
        }
      };

      self.observer.decode_value(&scope, &raw);
      debug!(key = %key, pattern = %raw, "building pattern");

      let predicate = match raw {
        Value::Bool(b) => Predicate::Always(b),
        Value::String(source) => match env.add_template_owned(key.clone(), source.clone()) {
          Ok(()) => {
            self.observer.template_value(&scope, &source, None);
            Predicate::Template { source }
          }
          Err(e) => {
            let message = e.to_string();
            self.observer.template_value(&scope, &source, Some(&message));
            errors.push(CompileError::Template {
              group: name.to_string(),
              key,
              message,
            });
            continue;
          }
        },
        other => Predicate::Literal(other),
      };

      patterns.push(Pattern {
        key,
        query,
        predicate,
      });
    }

    if let Some(err) = CompileError::join(errors) {
      return Err(err);
    }

    Ok(PatternGroup {
      name: name.to_string(),
      patterns,
      env: Arc::new(env),
      observer: self.observer.clone(),
    })
  }

  /// Compiles the three groups of a sensor with the same template options.
  pub fn sensor(
    &self,
    scope: &Scope,
    match_body: &Value,
    pass_body: &Value,
    fail_body: &Value,
  ) -> Result<Sensor, CompileError> {
    let match_group = self.group(scope, "match", match_body);
    let pass = self.group(scope, "pass", pass_body);
    let fail = self.group(scope, "fail", fail_body);

    match (match_group, pass, fail) {
      (Ok(match_group), Ok(pass), Ok(fail)) => Ok(Sensor::new(match_group, pass, fail)),
      (match_group, pass, fail) => {
        let errors = [match_group.err(), pass.err(), fail.err()]
          .into_iter()
          .flatten()
          .collect();
        Err(CompileError::join(errors).unwrap_or(CompileError::Multiple(Vec::new())))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  use hookt_trace::Observer;
  use serde_json::json;

  fn compiler() -> Compiler {
    Compiler::new(Templater::new(), hookt_trace::noop())
  }

  fn check(body: Value, obj: Value) -> bool {
    let scope = Scope::new();
    let group = compiler().group(&scope, "match", &body).unwrap();
    group.matches(&scope, &obj).unwrap()
  }

  #[test]
  fn test_string_literal() {
    assert!(check(json!({".foo.one": "bar"}), json!({"foo": {"one": "bar"}})));
    assert!(!check(json!({".foo.one": "bar"}), json!({"foo": {"one": "rab"}})));
  }

  #[test]
  fn test_numeric_string_matches_string() {
    assert!(check(json!({".foo.two": "10"}), json!({"foo": {"two": "10"}})));
    assert!(check(json!({".foo.two": "10"}), json!({"foo": {"two": 10}})));
  }

  #[test]
  fn test_boolean_literals() {
    assert!(check(json!({".foo.three": true}), json!({"foo": {"three": "123"}})));
    assert!(!check(json!({".foo.three": false}), json!({"foo": {"three": "123"}})));
  }

  #[test]
  fn test_true_on_missing_key_still_matches() {
    // Missing keys yield null, which is still a result.
    assert!(check(json!({".foo.nope": true}), json!({"foo": {}})));
  }

  #[test]
  fn test_several_keys() {
    let obj = json!({"foo": {"one": "bar", "two": "10", "three": "123"}});
    assert!(check(
      json!({".foo.one": "bar", ".foo.two": "10", ".foo.three": true}),
      obj.clone()
    ));
    assert!(!check(
      json!({".foo.one": "bar", ".foo.two": "10", ".foo.three": false}),
      obj
    ));
  }

  #[test]
  fn test_array_elements() {
    let body = json!({".foo[0]": "1", ".foo[1]": "2", ".foo[2]": "3"});
    assert!(check(body, json!({"foo": ["1", "2", "3"]})));
  }

  #[test]
  fn test_structural_literal() {
    assert!(check(json!({".a": [1, 2]}), json!({"a": [1, 2]})));
    assert!(check(json!({".a": {"b": null}}), json!({"a": {"b": null}})));
    assert!(!check(json!({".a": [1, 2]}), json!({"a": [2, 1]})));
  }

  #[test]
  fn test_empty_group_is_vacuous() {
    assert!(check(json!({}), json!(null)));
    assert!(check(Value::Null, json!({"anything": 1})));
  }

  #[test]
  fn test_empty_query_result_fails() {
    let scope = Scope::new();
    let group = compiler()
      .group(&scope, "match", &json!({".items[]": true}))
      .unwrap();
    let report = group.evaluate(&scope, &json!({"items": []})).unwrap();
    assert!(!report.matched);
    assert_eq!(report.keys[0].got, None);
  }

  #[test]
  fn test_template_setvar_then_var() {
    let c = compiler();
    let scope = Scope::new();
    let obj = json!({"foo": {"bar": "magic"}});

    let set = c
      .group(&scope, "pass", &json!({".foo.bar": "{{ setvar('bar', value) }}"}))
      .unwrap();
    assert!(set.matches(&scope, &obj).unwrap());

    let get = c
      .group(&scope, "pass", &json!({".foo.bar": "{{ var('bar') }}"}))
      .unwrap();
    assert!(get.matches(&scope, &obj).unwrap());
  }

  #[test]
  fn test_template_boolean_verdict() {
    assert!(check(json!({".n": "{{ value > 3 }}"}), json!({"n": 5})));
    assert!(!check(json!({".n": "{{ value > 3 }}"}), json!({"n": 1})));
  }

  #[test]
  fn test_template_output_compared_as_literal() {
    assert!(check(json!({".n": "{{ 1 + 1 }}"}), json!({"n": 2})));
    assert!(check(json!({".n": "{{ 1 + 1 }}"}), json!({"n": "2"})));
  }

  #[test]
  fn test_render_error_is_surfaced() {
    let scope = Scope::new();
    let group = compiler()
      .group(&scope, "pass", &json!({".n": "{{ value.missing.deeper }}"}))
      .unwrap();
    let err = group.matches(&scope, &json!({"n": 1})).unwrap_err();
    assert!(matches!(err, MatchError::Render { .. }));
  }

  #[test]
  fn test_query_error_is_surfaced() {
    let scope = Scope::new();
    let group = compiler()
      .group(&scope, "pass", &json!({".n.m": 1}))
      .unwrap();
    let err = group.matches(&scope, &json!({"n": "text"})).unwrap_err();
    assert!(matches!(err, MatchError::Query { .. }));
  }

  #[test]
  fn test_compile_errors_are_aggregated() {
    let err = compiler()
      .group(
        &Scope::new(),
        "match",
        &json!({"bad": 1, ".ok": 1, ".tmpl": "{{ unclosed", "also bad": true}),
      )
      .unwrap_err();
    match err {
      CompileError::Multiple(all) => assert_eq!(all.len(), 3),
      other => panic!("expected aggregated error, got {other:?}"),
    }
  }

  #[test]
  fn test_non_mapping_body() {
    let err = compiler()
      .group(&Scope::new(), "fail", &json!([1]))
      .unwrap_err();
    assert!(matches!(err, CompileError::NotAMap { kind: "array", .. }));
  }

  #[test]
  fn test_keys_sorted_and_evaluation_stops_at_first_miss() {
    let scope = Scope::new();
    let group = compiler()
      .group(&scope, "match", &json!({".c": 3, ".a": 1, ".b": 0}))
      .unwrap();
    assert_eq!(group.keys().collect::<Vec<_>>(), vec![".a", ".b", ".c"]);

    let report = group.evaluate(&scope, &json!({"a": 1, "b": 2, "c": 3})).unwrap();
    assert!(!report.matched);
    assert_eq!(report.keys.len(), 2);
    assert_eq!(report.keys[1].key, ".b");
    assert_eq!(report.keys[1].got, Some(json!(2)));
  }

  #[derive(Default)]
  struct Recorder(Mutex<Vec<String>>);

  impl Observer for Recorder {
    fn parse_key(&self, scope: &Scope, _error: Option<&str>) {
      self.0.lock().unwrap().push(format!("parse {scope}"));
    }

    fn equal_match(&self, scope: &Scope, _want: &Value, _got: &Value, ok: bool) {
      self.0.lock().unwrap().push(format!("equal {scope} {ok}"));
    }
  }

  #[test]
  fn test_hooks_follow_lexical_order() {
    let recorder = Arc::new(Recorder::default());
    let c = Compiler::new(Templater::new(), recorder.clone());
    let scope = Scope::new().job("j");
    let group = c.group(&scope, "match", &json!({".b": 2, ".a": 1})).unwrap();
    group.matches(&scope, &json!({"a": 1, "b": 2})).unwrap();

    let log = recorder.0.lock().unwrap().clone();
    assert_eq!(
      log,
      vec![
        "parse job=j pattern_group=match pattern=.a",
        "parse job=j pattern_group=match pattern=.b",
        "equal job=j pattern_group=match pattern=.a true",
        "equal job=j pattern_group=match pattern=.b true",
      ]
    );
  }
}
