//! Template environment used by string predicates and by plugins that evaluate
//! configuration strings (for example a source file name).
//!
//! Templates use minijinja syntax. Predicates see the extracted value as
//! `value`. Every environment carries the built-in function set:
//!
//! - `var(name)` reads a shared variable, blocking until it is stored
//! - `setvar(name, value)` stores a shared variable and returns `value`
//! - `env(name)` reads the environment; `setenv(name, value)` overrides a
//!   variable for every later `env` call of the run
//! - `xrand(pattern)` replaces every run of `X` with random letters
//! - `seterror(message)` is accepted and renders nothing; it has no effect yet
//!
//! Callers add their own functions through [`TemplateOption`]s.

use std::sync::Arc;

use dashmap::DashMap;
use hookt_vars::VarStore;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value};

/// Shared variables visible to every template of a run.
pub type Vars = VarStore<String, serde_json::Value>;

/// Hook that customises a freshly built environment, usually by registering
/// extra functions.
pub type TemplateOption = Arc<dyn Fn(&mut Environment<'static>) + Send + Sync>;

/// Builds template environments with the shared variables and any caller
/// options applied.
#[derive(Clone, Default)]
pub struct Templater {
  vars: Vars,
  env: Arc<DashMap<String, String>>,
  options: Vec<TemplateOption>,
}

impl Templater {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_vars(vars: Vars) -> Self {
    Self {
      vars,
      ..Self::default()
    }
  }

  pub fn vars(&self) -> &Vars {
    &self.vars
  }

  /// Returns a templater sharing the same variables with `options` appended.
  pub fn with_options(&self, options: impl IntoIterator<Item = TemplateOption>) -> Self {
    let mut next = self.clone();
    next.options.extend(options);
    next
  }

  pub fn environment(&self) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);

    let vars = self.vars.clone();
    env.add_function("var", move |name: String| -> Value {
      Value::from_serialize(vars.load(&name))
    });

    let vars = self.vars.clone();
    env.add_function("setvar", move |name: String, value: Value| -> Result<Value, Error> {
      let stored = serde_json::to_value(&value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("setvar {name:?}: {e}")))?;
      vars.store(name, stored);
      Ok(value)
    });

    let overrides = self.env.clone();
    env.add_function("env", move |name: String| -> String {
      match overrides.get(&name) {
        Some(value) => value.clone(),
        None => std::env::var(name).unwrap_or_default(),
      }
    });
    let overrides = self.env.clone();
    env.add_function("setenv", move |name: String, value: String| -> String {
      overrides.insert(name, value);
      String::new()
    });
    env.add_function("xrand", |pattern: String| -> String { xrand(&pattern) });
    env.add_function("seterror", |_message: String| -> String { String::new() });

    for option in &self.options {
      option(&mut env);
    }
    env
  }

  /// Renders a one-off template against `context`.
  pub fn render(&self, source: &str, context: &serde_json::Value) -> Result<String, Error> {
    self
      .environment()
      .render_str(source, Value::from_serialize(context))
  }
}

/// Replaces each run of `X` with the same number of random ASCII letters.
pub fn xrand(pattern: &str) -> String {
  const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

  pattern
    .chars()
    .map(|c| {
      if c == 'X' {
        CHARSET[rand::random::<usize>() % CHARSET.len()] as char
      } else {
        c
      }
    })
    .collect()
}
