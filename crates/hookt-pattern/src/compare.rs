//! Loose equality between an expected literal and an extracted value.
//!
//! Values first compare by their canonical rendering, so `"10"` equals `10`
//! and `2.0` equals `2`. Only when the renderings differ do they fall back to
//! structural equality.

use std::fmt::Write;

use serde_json::{Number, Value};

pub fn equal(want: &Value, got: &Value) -> bool {
  render(want) == render(got) || want == got
}

/// Canonical text form of a value. Strings render without quotes.
pub fn render(value: &Value) -> String {
  let mut out = String::new();
  render_into(&mut out, value);
  out
}

fn render_into(out: &mut String, value: &Value) {
  match value {
    Value::Null => out.push_str("null"),
    Value::Bool(b) => {
      let _ = write!(out, "{b}");
    }
    Value::Number(n) => render_number(out, n),
    Value::String(s) => out.push_str(s),
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(' ');
        }
        render_into(out, item);
      }
      out.push(']');
    }
    Value::Object(map) => {
      let mut keys: Vec<_> = map.keys().collect();
      keys.sort();
      out.push_str("map[");
      for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
          out.push(' ');
        }
        out.push_str(key);
        out.push(':');
        render_into(out, &map[key]);
      }
      out.push(']');
    }
  }
}

fn render_number(out: &mut String, n: &Number) {
  if let Some(i) = n.as_i64() {
    let _ = write!(out, "{i}");
  } else if let Some(u) = n.as_u64() {
    let _ = write!(out, "{u}");
  } else if let Some(f) = n.as_f64() {
    if f.fract() == 0.0 && f.abs() < 1e15 {
      let _ = write!(out, "{}", f as i64);
    } else {
      let _ = write!(out, "{f}");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_string_and_number_render_alike() {
    assert!(equal(&json!("10"), &json!(10)));
    assert!(equal(&json!(10), &json!("10")));
  }

  #[test]
  fn test_float_and_integer() {
    assert!(equal(&json!(2.0), &json!(2)));
    assert!(!equal(&json!(2.5), &json!(2)));
    assert_eq!(render(&json!(0.25)), "0.25");
  }

  #[test]
  fn test_composites() {
    assert!(equal(&json!([1, "a"]), &json!(["1", "a"])));
    assert!(equal(&json!({"b": 1, "a": [true]}), &json!({"a": [true], "b": 1})));
    assert!(!equal(&json!({"a": 1}), &json!({"a": 2})));
    assert_eq!(render(&json!({"b": 1, "a": "x"})), "map[a:x b:1]");
  }

  #[test]
  fn test_null() {
    assert!(equal(&Value::Null, &Value::Null));
    assert!(!equal(&Value::Null, &json!("")));
  }
}
