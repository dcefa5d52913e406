use serde_json::Value;
use tracing::{info, warn};

use crate::{Observer, Scope};

/// An observer that forwards every hook to `tracing`.
///
/// Successful steps are logged at `info`, failures (parse errors, failed
/// comparisons, unclaimed messages, timeouts) at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
  fn wire_job(&self, index: usize, job_id: &str) {
    info!(index, job = %job_id, "trace: wire_job");
  }

  fn wire_plugin(&self, scope: &Scope, index: usize, uses: &str, with: &Value) {
    info!(%scope, index, uses, with = %with, "trace: wire_plugin");
  }

  fn wire_step(&self, scope: &Scope, index: usize, uses: &str, with: &Value) {
    info!(%scope, index, uses, with = %with, "trace: wire_step");
  }

  fn parse_key(&self, scope: &Scope, error: Option<&str>) {
    match error {
      Some(error) => warn!(%scope, error, "trace: parse_key"),
      None => info!(%scope, "trace: parse_key"),
    }
  }

  fn decode_value(&self, scope: &Scope, value: &Value) {
    info!(%scope, value = %value, "trace: decode_value");
  }

  fn template_value(&self, scope: &Scope, source: &str, error: Option<&str>) {
    match error {
      Some(error) => warn!(%scope, source, error, "trace: template_value"),
      None => info!(%scope, source, "trace: template_value"),
    }
  }

  fn execute_match(&self, scope: &Scope, output: &str, error: Option<&str>) {
    match error {
      Some(error) => warn!(%scope, output, error, "trace: execute_match"),
      None => info!(%scope, output, "trace: execute_match"),
    }
  }

  fn decode_match(&self, scope: &Scope, output: &str, error: Option<&str>) {
    match error {
      Some(error) => warn!(%scope, output, error, "trace: decode_match"),
      None => info!(%scope, output, "trace: decode_match"),
    }
  }

  fn equal_match(&self, scope: &Scope, want: &Value, got: &Value, ok: bool) {
    if ok {
      info!(%scope, want = %want, got = %got, "trace: equal_match");
    } else {
      warn!(%scope, want = %want, got = %got, "trace: equal_match");
    }
  }

  fn match_timeout(&self, scope: &Scope) {
    warn!(%scope, "trace: match_timeout");
  }

  fn before_publish(&self, scope: &Scope, seq: usize) {
    info!(%scope, seq, "trace: before_publish");
  }

  fn publish(&self, scope: &Scope, seq: usize) {
    info!(%scope, seq, "trace: publish");
  }

  fn before_stop(&self, scope: &Scope, slot: usize) {
    info!(%scope, slot, "trace: before_stop");
  }

  fn stop(&self, scope: &Scope, slot: usize) {
    info!(%scope, slot, "trace: stop");
  }

  fn before_demux(&self, scope: &Scope, seq: usize) {
    info!(%scope, seq, "trace: before_demux");
  }

  fn demux(&self, scope: &Scope, seq: usize) {
    info!(%scope, seq, "trace: demux");
  }

  fn before_mux(&self, scope: &Scope, seq: usize, slot: usize) {
    info!(%scope, seq, slot, "trace: before_mux");
  }

  fn mux(&self, scope: &Scope, seq: usize, slot: usize) {
    info!(%scope, seq, slot, "trace: mux");
  }

  fn wait(&self, scope: &Scope, seq: usize, slot: usize, claimed: bool) {
    if claimed {
      info!(%scope, seq, slot, "trace: wait");
    } else {
      warn!(%scope, seq, slot, "trace: wait");
    }
  }

  fn done(&self, scope: &Scope, seq: usize, slot: usize) {
    info!(%scope, seq, slot, "trace: done");
  }

  fn drain(&self, scope: &Scope, slot: usize) {
    info!(%scope, slot, "trace: drain");
  }
}
