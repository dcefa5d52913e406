use serde::Deserialize;
use serde_json::Value;

/// `with` body of an `inline` plugin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineConfig {
  #[serde(default)]
  pub publish: PublishConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
  /// Template for the path of a file holding a stream of JSON values.
  #[serde(default)]
  pub file: Option<String>,
  /// Values published after the file contents.
  #[serde(default)]
  pub messages: Vec<Value>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_publish_body() {
    let cfg: InlineConfig = serde_json::from_value(json!({
      "publish": {"file": "{{ env('DIR') }}/a.json", "messages": [{"v": 1}]}
    }))
    .unwrap();
    assert_eq!(cfg.publish.file.as_deref(), Some("{{ env('DIR') }}/a.json"));
    assert_eq!(cfg.publish.messages, vec![json!({"v": 1})]);
  }

  #[test]
  fn test_unknown_fields_are_rejected() {
    assert!(serde_json::from_value::<InlineConfig>(json!({"publish": {"path": "x"}})).is_err());
    assert!(serde_json::from_value::<InlineConfig>(json!({"subscribe": {}})).is_err());
  }
}
