use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// How the bus hands a message to its steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  /// Every active step receives every message.
  #[default]
  Async,
  /// Steps are offered each message in creation order until one claims it.
  Sync,
}

/// `with` body of an `event` plugin.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventConfig {
  /// Ids of sibling plugins to read messages from.
  pub sources: Vec<String>,
  #[serde(default)]
  pub mode: Mode,
  #[serde(default, deserialize_with = "hookt_config::deserialize_duration_opt")]
  pub inactive_timeout: Option<Duration>,
  /// Absolute per-step deadline. Invalid values are ignored.
  #[serde(default)]
  pub timeout: Option<String>,
}

impl EventConfig {
  pub fn timeout(&self) -> Option<Duration> {
    let raw = self.timeout.as_deref()?;
    match hookt_config::parse_duration(raw) {
      Ok(d) => Some(d),
      Err(e) => {
        warn!(timeout = %raw, error = %e, "ignoring invalid timeout");
        None
      }
    }
  }
}

/// `with` body of an `event` step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
  #[serde(default, rename = "match")]
  pub match_group: Value,
  #[serde(default)]
  pub pass: Value,
  #[serde(default)]
  pub fail: Value,
  #[serde(default, deserialize_with = "hookt_config::deserialize_duration_opt")]
  pub inactive_timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_defaults() {
    let cfg: EventConfig = serde_json::from_value(json!({"sources": ["a"]})).unwrap();
    assert_eq!(cfg.mode, Mode::Async);
    assert_eq!(cfg.inactive_timeout, None);
    assert_eq!(cfg.timeout(), None);
  }

  #[test]
  fn test_mode_and_durations() {
    let cfg: EventConfig = serde_json::from_value(json!({
      "sources": ["a", "b"],
      "mode": "sync",
      "inactive_timeout": "10ms",
      "timeout": "2s",
    }))
    .unwrap();
    assert_eq!(cfg.mode, Mode::Sync);
    assert_eq!(cfg.inactive_timeout, Some(Duration::from_millis(10)));
    assert_eq!(cfg.timeout(), Some(Duration::from_secs(2)));
  }

  #[test]
  fn test_invalid_mode_is_rejected() {
    let err = serde_json::from_value::<EventConfig>(json!({"sources": [], "mode": "fanout"}));
    assert!(err.is_err());
  }

  #[test]
  fn test_invalid_timeout_is_ignored() {
    let cfg: EventConfig =
      serde_json::from_value(json!({"sources": ["a"], "timeout": "soon"})).unwrap();
    assert_eq!(cfg.timeout(), None);
  }

  #[test]
  fn test_invalid_inactive_timeout_is_rejected() {
    let err = serde_json::from_value::<EventConfig>(json!({"sources": ["a"], "inactive_timeout": "x"}));
    assert!(err.is_err());
  }

  #[test]
  fn test_step_config() {
    let cfg: StepConfig = serde_json::from_value(json!({
      "match": {".v": true},
      "pass": {".v": 2},
      "inactive_timeout": "1s",
    }))
    .unwrap();
    assert_eq!(cfg.match_group, json!({".v": true}));
    assert_eq!(cfg.fail, Value::Null);
    assert_eq!(cfg.inactive_timeout, Some(Duration::from_secs(1)));

    assert!(serde_json::from_value::<StepConfig>(json!({"passs": {}})).is_err());
  }
}
