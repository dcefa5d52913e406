//! Path queries over JSON values.
//!
//! A small subset of jq path syntax:
//!
//! | syntax        | meaning                                    |
//! |---------------|--------------------------------------------|
//! | `.`           | identity                                   |
//! | `.name`       | object field (`null` when missing)         |
//! | `."any key"`  | object field with arbitrary characters     |
//! | `.[N]`, `[N]` | array element, negative counts from the end |
//! | `["key"]`     | object field                               |
//! | `[]`          | iterate array elements or object values    |
//! | `?` suffix    | suppress type errors for that segment       |
//!
//! Evaluation yields a stream of values because `[]` fans out.

use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
  #[error("syntax error at offset {offset}: {message}")]
  Syntax { offset: usize, message: String },

  #[error("cannot index {kind} with {index}")]
  Index { kind: &'static str, index: String },

  #[error("cannot iterate over {kind}")]
  Iterate { kind: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
  Field(String),
  Index(i64),
  Iterate,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
  segment: Segment,
  optional: bool,
}

/// A compiled path query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
  source: String,
  steps: Vec<Step>,
}

impl Query {
  pub fn parse(source: &str) -> Result<Self, QueryError> {
    let steps = Parser::new(source).parse()?;
    Ok(Self {
      source: source.to_string(),
      steps,
    })
  }

  pub fn as_str(&self) -> &str {
    &self.source
  }

  /// Runs the query against `input` and returns every value it yields.
  pub fn eval(&self, input: &Value) -> Result<Vec<Value>, QueryError> {
    let mut current = vec![input];
    for step in &self.steps {
      let mut next = Vec::with_capacity(current.len());
      for value in current {
        match select(&step.segment, value) {
          Ok(children) => next.extend(children),
          Err(_) if step.optional => {}
          Err(e) => return Err(e),
        }
      }
      current = next;
    }
    Ok(current.into_iter().cloned().collect())
  }

  /// First value the query yields, if any. Evaluation stops there.
  pub fn first(&self, input: &Value) -> Result<Option<Value>, QueryError> {
    Ok(first_in(&self.steps, input)?.cloned())
  }
}

impl fmt::Display for Query {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.source)
  }
}

/// JSON name of the value's type, as used in error messages.
pub(crate) fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

static NULL: Value = Value::Null;

fn first_in<'a>(steps: &[Step], value: &'a Value) -> Result<Option<&'a Value>, QueryError> {
  let Some((step, rest)) = steps.split_first() else {
    return Ok(Some(value));
  };
  let children = match select(&step.segment, value) {
    Ok(children) => children,
    Err(_) if step.optional => return Ok(None),
    Err(e) => return Err(e),
  };
  for child in children {
    if let Some(found) = first_in(rest, child)? {
      return Ok(Some(found));
    }
  }
  Ok(None)
}

/// Values `segment` selects from `value`. Missing keys and indices select null.
fn select<'a>(segment: &Segment, value: &'a Value) -> Result<Vec<&'a Value>, QueryError> {
  let selected = match (segment, value) {
    (Segment::Field(_), Value::Null) | (Segment::Index(_), Value::Null) => vec![&NULL],
    (Segment::Field(name), Value::Object(map)) => vec![map.get(name).unwrap_or(&NULL)],
    (Segment::Index(i), Value::Array(items)) => {
      let len = items.len() as i64;
      let at = if *i < 0 { len + i } else { *i };
      let item = if (0..len).contains(&at) {
        &items[at as usize]
      } else {
        &NULL
      };
      vec![item]
    }
    (Segment::Iterate, Value::Array(items)) => items.iter().collect(),
    (Segment::Iterate, Value::Object(map)) => map.values().collect(),
    (Segment::Iterate, other) => return Err(QueryError::Iterate { kind: kind(other) }),
    (Segment::Field(name), other) => {
      return Err(QueryError::Index {
        kind: kind(other),
        index: format!("{name:?}"),
      });
    }
    (Segment::Index(i), other) => {
      return Err(QueryError::Index {
        kind: kind(other),
        index: i.to_string(),
      });
    }
  };
  Ok(selected)
}

struct Parser<'a> {
  src: &'a str,
  pos: usize,
}

impl<'a> Parser<'a> {
  fn new(src: &'a str) -> Self {
    Self { src, pos: 0 }
  }

  fn err<T>(&self, message: impl Into<String>) -> Result<T, QueryError> {
    Err(QueryError::Syntax {
      offset: self.pos,
      message: message.into(),
    })
  }

  fn peek(&self) -> Option<char> {
    self.src[self.pos..].chars().next()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.pos += c.len_utf8();
    Some(c)
  }

  fn skip_ws(&mut self) {
    while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
      self.pos += c.len_utf8();
    }
  }

  fn parse(mut self) -> Result<Vec<Step>, QueryError> {
    let mut steps = Vec::new();
    self.skip_ws();
    if self.bump() != Some('.') {
      return self.err("query must start with '.'");
    }
    // A bare leading '.' is the identity.
    if let Some(step) = self.field()? {
      steps.push(step);
    }

    loop {
      self.skip_ws();
      match self.peek() {
        None => break,
        Some('.') => {
          self.bump();
          match self.field()? {
            Some(step) => steps.push(step),
            None if self.peek() == Some('[') => {}
            None => return self.err("expected field name after '.'"),
          }
        }
        Some('[') => steps.push(self.bracket()?),
        Some(c) => return self.err(format!("unexpected character {c:?}")),
      }
    }
    Ok(steps)
  }

  fn field(&mut self) -> Result<Option<Step>, QueryError> {
    let name = match self.peek() {
      Some('"') => self.string()?,
      Some(c) if c == '_' || c.is_ascii_alphabetic() => self.ident(),
      _ => return Ok(None),
    };
    Ok(Some(self.step(Segment::Field(name))))
  }

  fn bracket(&mut self) -> Result<Step, QueryError> {
    self.bump();
    self.skip_ws();
    let segment = match self.peek() {
      Some(']') => Segment::Iterate,
      Some('"') => Segment::Field(self.string()?),
      Some(c) if c == '-' || c.is_ascii_digit() => Segment::Index(self.integer()?),
      _ => return self.err("expected index, string or ']'"),
    };
    self.skip_ws();
    if self.bump() != Some(']') {
      return self.err("expected ']'");
    }
    Ok(self.step(segment))
  }

  fn step(&mut self, segment: Segment) -> Step {
    let optional = self.peek() == Some('?');
    if optional {
      self.bump();
    }
    Step { segment, optional }
  }

  fn ident(&mut self) -> String {
    let start = self.pos;
    while self
      .peek()
      .is_some_and(|c| c == '_' || c.is_ascii_alphanumeric())
    {
      self.pos += 1;
    }
    self.src[start..self.pos].to_string()
  }

  fn integer(&mut self) -> Result<i64, QueryError> {
    let start = self.pos;
    if self.peek() == Some('-') {
      self.pos += 1;
    }
    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
      self.pos += 1;
    }
    match self.src[start..self.pos].parse() {
      Ok(n) => Ok(n),
      Err(_) => self.err("invalid integer index"),
    }
  }

  fn string(&mut self) -> Result<String, QueryError> {
    let start = self.pos;
    self.bump();
    let mut escaped = false;
    loop {
      match self.bump() {
        None => return self.err("unterminated string"),
        Some('\\') if !escaped => escaped = true,
        Some('"') if !escaped => break,
        Some(_) => escaped = false,
      }
    }
    match serde_json::from_str(&self.src[start..self.pos]) {
      Ok(s) => Ok(s),
      Err(e) => self.err(format!("invalid string literal: {e}")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn eval(q: &str, v: Value) -> Vec<Value> {
    Query::parse(q).unwrap().eval(&v).unwrap()
  }

  #[test]
  fn test_identity() {
    assert_eq!(eval(".", json!({"a": 1})), vec![json!({"a": 1})]);
  }

  #[test]
  fn test_nested_fields() {
    let v = json!({"foo": {"one": "bar"}});
    assert_eq!(eval(".foo.one", v), vec![json!("bar")]);
  }

  #[test]
  fn test_missing_field_is_null() {
    assert_eq!(eval(".foo.two", json!({"foo": {}})), vec![Value::Null]);
    assert_eq!(eval(".a.b.c", json!({})), vec![Value::Null]);
  }

  #[test]
  fn test_array_index() {
    let v = json!({"foo": ["1", "2", "3"]});
    assert_eq!(eval(".foo[0]", v.clone()), vec![json!("1")]);
    assert_eq!(eval(".foo[-1]", v.clone()), vec![json!("3")]);
    assert_eq!(eval(".foo[9]", v.clone()), vec![Value::Null]);
    assert_eq!(eval(".foo.[1]", v), vec![json!("2")]);
  }

  #[test]
  fn test_quoted_fields() {
    let v = json!({"a key": {"x-y": 1}});
    assert_eq!(eval(".\"a key\"[\"x-y\"]", v), vec![json!(1)]);
  }

  #[test]
  fn test_iterate() {
    let v = json!({"items": [{"id": 1}, {"id": 2}]});
    assert_eq!(eval(".items[].id", v), vec![json!(1), json!(2)]);
    assert!(eval(".items[]", json!({"items": []})).is_empty());
  }

  #[test]
  fn test_first_stops_at_first_result() {
    let q = Query::parse(".items[].id").unwrap();
    let v = json!({"items": [{"id": 1}, 5]});
    assert!(q.eval(&v).is_err());
    assert_eq!(q.first(&v).unwrap(), Some(json!(1)));
    assert_eq!(q.first(&json!({"items": []})).unwrap(), None);
  }

  #[test]
  fn test_type_errors() {
    let q = Query::parse(".foo.bar").unwrap();
    let err = q.eval(&json!({"foo": 3})).unwrap_err();
    assert!(matches!(err, QueryError::Index { kind: "number", .. }));

    let q = Query::parse(".foo[]").unwrap();
    assert!(q.eval(&json!({"foo": "s"})).is_err());
  }

  #[test]
  fn test_optional_suppresses_errors() {
    let q = Query::parse(".foo.bar?").unwrap();
    assert!(q.eval(&json!({"foo": 3})).unwrap().is_empty());
  }

  #[test]
  fn test_syntax_errors() {
    assert!(Query::parse("foo").is_err());
    assert!(Query::parse(".foo[").is_err());
    assert!(Query::parse(".foo[\"x]").is_err());
    assert!(Query::parse(".foo bar").is_err());
    assert!(Query::parse(".foo.").is_err());
  }

  #[test]
  fn test_display_keeps_source() {
    assert_eq!(Query::parse(".foo[0]").unwrap().to_string(), ".foo[0]");
  }
}
