//! Duration strings such as `10ms`, `1.5s` or `1h30m`.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration {input:?}: {reason}")]
pub struct DurationError {
  pub input: String,
  pub reason: &'static str,
}

fn unit(suffix: &str) -> Option<f64> {
  Some(match suffix {
    "ns" => 1.0,
    "us" | "µs" | "μs" => 1e3,
    "ms" => 1e6,
    "s" => 1e9,
    "m" => 60e9,
    "h" => 3600e9,
    _ => return None,
  })
}

/// Parses a sequence of decimal numbers, each with a unit suffix.
///
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare `0`
/// is accepted. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
  let err = |reason| DurationError {
    input: input.to_string(),
    reason,
  };

  let s = input.trim();
  if s == "0" {
    return Ok(Duration::ZERO);
  }
  if s.is_empty() {
    return Err(err("empty"));
  }
  if s.starts_with('-') {
    return Err(err("negative"));
  }
  let mut rest = s.strip_prefix('+').unwrap_or(s);

  let mut nanos = 0f64;
  while !rest.is_empty() {
    let number_len = rest
      .find(|c: char| !(c.is_ascii_digit() || c == '.'))
      .unwrap_or(rest.len());
    if number_len == 0 {
      return Err(err("expected number"));
    }
    let number: f64 = rest[..number_len].parse().map_err(|_| err("bad number"))?;
    rest = &rest[number_len..];

    let unit_len = rest
      .find(|c: char| c.is_ascii_digit() || c == '.')
      .unwrap_or(rest.len());
    if unit_len == 0 {
      return Err(err("missing unit"));
    }
    let scale = unit(&rest[..unit_len]).ok_or_else(|| err("unknown unit"))?;
    rest = &rest[unit_len..];

    nanos += number * scale;
  }

  if !nanos.is_finite() || nanos > u64::MAX as f64 {
    return Err(err("overflow"));
  }
  Ok(Duration::from_nanos(nanos.round() as u64))
}

/// `deserialize_with` helper for optional duration strings.
pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<String>::deserialize(deserializer)? {
    Some(s) => parse_duration(&s).map(Some).map_err(serde::de::Error::custom),
    None => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_single_units() {
    assert_eq!(parse_duration("10ms").unwrap(), Duration::from_millis(10));
    assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    assert_eq!(parse_duration("5us").unwrap(), Duration::from_micros(5));
    assert_eq!(parse_duration("5µs").unwrap(), Duration::from_micros(5));
    assert_eq!(parse_duration("7ns").unwrap(), Duration::from_nanos(7));
  }

  #[test]
  fn test_compound_and_fractional() {
    assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
    assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
    assert_eq!(parse_duration("1h0m1s").unwrap(), Duration::from_secs(3601));
  }

  #[test]
  fn test_zero() {
    assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
  }

  #[test]
  fn test_rejects_garbage() {
    for bad in ["", "10", "ms", "1x", "-1s", "1.2.3s", "1s2"] {
      assert!(parse_duration(bad).is_err(), "{bad} should not parse");
    }
  }
}
