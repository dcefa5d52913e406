use hookt_trace::Scope;
use serde_json::Value;

use crate::error::MatchError;
use crate::pattern::{GroupReport, PatternGroup};

/// What a sensor concluded about one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// The match group rejected the value; it is not addressed to this step.
  Unmatched,
  /// A non-empty fail group matched.
  Failed,
  Passed,
  /// Matched, but neither fail nor pass held. Keep waiting.
  Pending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
  pub outcome: Outcome,
  /// Report of the group that decided the outcome.
  pub report: GroupReport,
}

/// Match, pass and fail groups evaluated together against each value.
#[derive(Debug)]
pub struct Sensor {
  match_group: PatternGroup,
  pass: PatternGroup,
  fail: PatternGroup,
}

impl Sensor {
  pub fn new(match_group: PatternGroup, pass: PatternGroup, fail: PatternGroup) -> Self {
    Self {
      match_group,
      pass,
      fail,
    }
  }

  pub fn evaluate(&self, scope: &Scope, value: &Value) -> Result<Evaluation, MatchError> {
    let report = self.match_group.evaluate(scope, value)?;
    if !report.matched {
      return Ok(Evaluation {
        outcome: Outcome::Unmatched,
        report,
      });
    }

    // An empty fail group matches vacuously but is not a failure condition.
    if !self.fail.is_empty() {
      let report = self.fail.evaluate(scope, value)?;
      if report.matched {
        return Ok(Evaluation {
          outcome: Outcome::Failed,
          report,
        });
      }
    }

    let report = self.pass.evaluate(scope, value)?;
    let outcome = if report.matched {
      Outcome::Passed
    } else {
      Outcome::Pending
    };
    Ok(Evaluation { outcome, report })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{Compiler, Templater};
  use serde_json::json;

  fn sensor(m: Value, p: Value, f: Value) -> Sensor {
    Compiler::new(Templater::new(), hookt_trace::noop())
      .sensor(&Scope::new(), &m, &p, &f)
      .unwrap()
  }

  fn outcome(s: &Sensor, v: Value) -> Outcome {
    s.evaluate(&Scope::new(), &v).unwrap().outcome
  }

  #[test]
  fn test_unmatched_messages_are_ignored() {
    let s = sensor(json!({".kind": "order"}), json!({".v": 2}), Value::Null);
    assert_eq!(outcome(&s, json!({"kind": "user", "v": 2})), Outcome::Unmatched);
  }

  #[test]
  fn test_pass_and_pending() {
    let s = sensor(json!({".v": true}), json!({".v": 2}), Value::Null);
    assert_eq!(outcome(&s, json!({"v": 1})), Outcome::Pending);
    assert_eq!(outcome(&s, json!({"v": 2})), Outcome::Passed);
  }

  #[test]
  fn test_fail_takes_precedence_over_pass() {
    let s = sensor(json!({}), json!({".v": true}), json!({".error": "boom"}));
    let eval = s.evaluate(&Scope::new(), &json!({"v": 1, "error": "boom"})).unwrap();
    assert_eq!(eval.outcome, Outcome::Failed);
    assert_eq!(eval.report.keys[0].key, ".error");
  }

  #[test]
  fn test_empty_fail_group_never_fails() {
    let s = sensor(json!({}), json!({".v": 9}), json!({}));
    assert_eq!(outcome(&s, json!({"v": 1})), Outcome::Pending);
  }

  #[test]
  fn test_empty_pass_group_passes_first_match() {
    let s = sensor(json!({".v": true}), Value::Null, Value::Null);
    assert_eq!(outcome(&s, json!({"v": 1})), Outcome::Passed);
  }

  #[test]
  fn test_errors_from_any_group_are_reported_together() {
    let err = Compiler::new(Templater::new(), hookt_trace::noop())
      .sensor(&Scope::new(), &json!({"x": 1}), &json!([]), &json!({".ok": 1}))
      .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("match pattern"));
    assert!(text.contains("pass pattern"));
  }
}
