//! Step outcome aggregation.

use std::sync::{Mutex, PoisonError};

use hookt_pattern::KeyOutcome;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckOutcome {
  /// No message satisfied the step before it gave up.
  MatchFailure,
  /// The fail group matched.
  FailTriggered,
  Pass,
}

/// A recorded terminal outcome of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckEvent {
  pub job: String,
  pub step: String,
  pub desc: String,
  pub outcome: CheckOutcome,
  /// Keys of the group that decided the outcome.
  pub keys: Vec<KeyOutcome>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepCounts {
  pub passed: usize,
  pub failed: usize,
}

/// Snapshot of everything recorded so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Results {
  pub steps: StepCounts,
  pub events: Vec<CheckEvent>,
}

/// Thread-safe results aggregator shared by every step of a run.
#[derive(Debug, Default)]
pub struct Check {
  results: Mutex<Results>,
}

impl Check {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records an event, counting it as passed or failed by its outcome.
  pub fn record(&self, event: CheckEvent) {
    let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
    match event.outcome {
      CheckOutcome::Pass => results.steps.passed += 1,
      CheckOutcome::MatchFailure | CheckOutcome::FailTriggered => results.steps.failed += 1,
    }
    results.events.push(event);
  }

  pub fn counts(&self) -> StepCounts {
    self.results.lock().unwrap_or_else(PoisonError::into_inner).steps
  }

  pub fn results(&self) -> Results {
    self.results.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::Arc;

  fn event(step: &str, outcome: CheckOutcome) -> CheckEvent {
    CheckEvent {
      job: "j".into(),
      step: step.into(),
      desc: format!("{step} desc"),
      outcome,
      keys: vec![KeyOutcome {
        key: ".v".into(),
        want: json!(2),
        got: Some(json!(2)),
        ok: outcome == CheckOutcome::Pass,
      }],
      error: None,
    }
  }

  #[test]
  fn test_counts_by_outcome() {
    let check = Check::new();
    check.record(event("a", CheckOutcome::Pass));
    check.record(event("b", CheckOutcome::FailTriggered));
    check.record(event("c", CheckOutcome::MatchFailure));
    assert_eq!(check.counts(), StepCounts { passed: 1, failed: 2 });
    assert_eq!(check.results().events.len(), 3);
  }

  #[test]
  fn test_concurrent_records() {
    let check = Arc::new(Check::new());
    let handles: Vec<_> = (0..8)
      .map(|i| {
        let check = Arc::clone(&check);
        std::thread::spawn(move || check.record(event(&i.to_string(), CheckOutcome::Pass)))
      })
      .collect();
    for h in handles {
      h.join().unwrap();
    }
    assert_eq!(check.counts(), StepCounts { passed: 8, failed: 0 });
  }

  #[test]
  fn test_results_serialize() {
    let check = Check::new();
    check.record(event("a", CheckOutcome::FailTriggered));
    let value = serde_json::to_value(check.results()).unwrap();
    assert_eq!(value["steps"], json!({"passed": 0, "failed": 1}));
    assert_eq!(value["events"][0]["outcome"], json!("fail-triggered"));
    assert_eq!(value["events"][0]["keys"][0]["key"], json!(".v"));
    assert!(value["events"][0].get("error").is_none());
  }
}
