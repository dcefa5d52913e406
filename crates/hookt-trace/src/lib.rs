//! hookt Trace
//!
//! Observer hooks invoked while a workflow is wired, while pattern groups are
//! compiled and evaluated, and while the event bus schedules messages.
//!
//! Hooks are grouped on a single [`Observer`] trait. Every method has an empty
//! default body, so implementations only override what they care about. The
//! observer is passed explicitly (as `Arc<dyn Observer>`) to every component
//! that emits hooks; [`NoopObserver`] is the default everywhere.

mod log;
mod scope;

use std::sync::Arc;

use serde_json::Value;

pub use log::LogObserver;
pub use scope::Scope;

/// Shared handle to an observer.
pub type SharedObserver = Arc<dyn Observer>;

/// Receives trace hooks.
///
/// Implementations must be cheap: hooks run inline on the calling task,
/// including inside pattern evaluation.
pub trait Observer: Send + Sync {
  /// A job descriptor is about to be wired.
  fn wire_job(&self, _index: usize, _job_id: &str) {}

  /// A plugin instance was created and decoded.
  fn wire_plugin(&self, _scope: &Scope, _index: usize, _uses: &str, _with: &Value) {}

  /// A step runner was created and decoded.
  fn wire_step(&self, _scope: &Scope, _index: usize, _uses: &str, _with: &Value) {}

  /// A pattern key was parsed as a path query.
  fn parse_key(&self, _scope: &Scope, _error: Option<&str>) {}

  /// A pattern literal was decoded.
  fn decode_value(&self, _scope: &Scope, _value: &Value) {}

  /// A string literal was compiled as a template.
  fn template_value(&self, _scope: &Scope, _source: &str, _error: Option<&str>) {}

  /// A template predicate was executed.
  fn execute_match(&self, _scope: &Scope, _output: &str, _error: Option<&str>) {}

  /// The output of a template predicate was decoded as a literal.
  fn decode_match(&self, _scope: &Scope, _output: &str, _error: Option<&str>) {}

  /// A want/got comparison finished.
  fn equal_match(&self, _scope: &Scope, _want: &Value, _got: &Value, _ok: bool) {}

  /// A step gave up waiting for a qualifying message.
  fn match_timeout(&self, _scope: &Scope) {}

  /// A source is about to publish message `seq`.
  fn before_publish(&self, _scope: &Scope, _seq: usize) {}

  /// A source published message `seq`.
  fn publish(&self, _scope: &Scope, _seq: usize) {}

  /// Slot `slot` is about to announce that it is stopping.
  fn before_stop(&self, _scope: &Scope, _slot: usize) {}

  /// The scheduler closed slot `slot`.
  fn stop(&self, _scope: &Scope, _slot: usize) {}

  /// The scheduler is about to fan out message `seq`.
  fn before_demux(&self, _scope: &Scope, _seq: usize) {}

  /// The scheduler finished fanning out message `seq`.
  fn demux(&self, _scope: &Scope, _seq: usize) {}

  /// Message `seq` is about to be delivered to slot `slot`.
  fn before_mux(&self, _scope: &Scope, _seq: usize, _slot: usize) {}

  /// Message `seq` was delivered to slot `slot`.
  fn mux(&self, _scope: &Scope, _seq: usize, _slot: usize) {}

  /// Slot `slot` answered a claim for message `seq`.
  fn wait(&self, _scope: &Scope, _seq: usize, _slot: usize, _claimed: bool) {}

  /// Message `seq` was claimed by slot `slot`; propagation stops.
  fn done(&self, _scope: &Scope, _seq: usize, _slot: usize) {}

  /// Slot `slot` finished draining its channel.
  fn drain(&self, _scope: &Scope, _slot: usize) {}
}

/// An observer that ignores every hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Convenience constructor for the default observer.
pub fn noop() -> SharedObserver {
  Arc::new(NoopObserver)
}
