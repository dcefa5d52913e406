use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time a step waits for its next message.
pub const DEFAULT_INACTIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Engine-wide settings handed to every plugin during wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
  /// Inactivity timeout used by steps that do not configure their own.
  #[serde(
    default = "default_inactive_timeout",
    deserialize_with = "deserialize_timeout",
    serialize_with = "serialize_timeout"
  )]
  pub inactive_timeout: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      inactive_timeout: DEFAULT_INACTIVE_TIMEOUT,
    }
  }
}

fn default_inactive_timeout() -> Duration {
  DEFAULT_INACTIVE_TIMEOUT
}

fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let s = String::deserialize(deserializer)?;
  crate::parse_duration(&s).map_err(serde::de::Error::custom)
}

fn serialize_timeout<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
  S: serde::Serializer,
{
  serializer.serialize_str(&format!("{}ms", value.as_millis()))
}
