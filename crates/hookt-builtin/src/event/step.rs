use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use hookt_pattern::{Compiler, GroupReport, Outcome, TemplateOption};
use hookt_trace::Scope;
use hookt_workflow::{Check, CheckEvent, CheckOutcome, RunContext, Runner, StepError};
use minijinja::{Environment, Error, ErrorKind, Value};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info, instrument, warn};

use super::bus::SlotHandle;
use super::config::StepConfig;

/// Tags set by one step's templates.
type Tags = Arc<Mutex<HashMap<String, Value>>>;

/// Registers `tag(name)` / `tag(name, value)` backed by `tags`.
fn tag_option(tags: Tags) -> TemplateOption {
  Arc::new(move |env: &mut Environment<'static>| {
    let tags = tags.clone();
    env.add_function(
      "tag",
      move |name: String, value: Option<Value>| -> Result<Value, Error> {
        let mut tags = tags.lock().unwrap_or_else(PoisonError::into_inner);
        match value {
          Some(value) => {
            tags.insert(name, value.clone());
            Ok(value)
          }
          None => tags.get(&name).cloned().ok_or_else(|| {
            Error::new(ErrorKind::InvalidOperation, format!("tag {name:?} not found"))
          }),
        }
      },
    );
  })
}

/// A step of an `event` plugin: waits for a message that satisfies its
/// pass group, failing on the fail group or after a quiet period.
pub(crate) struct EventStep {
  config: StepConfig,
  compiler: Compiler,
  slot: SlotHandle,
  inactive_timeout: Duration,
  timeout: Option<Duration>,
}

impl EventStep {
  pub fn new(
    config: StepConfig,
    compiler: &Compiler,
    slot: SlotHandle,
    inactive_timeout: Duration,
    timeout: Option<Duration>,
  ) -> Self {
    let tags = Tags::default();
    Self {
      config,
      compiler: compiler.with_options([tag_option(tags)]),
      slot,
      inactive_timeout,
      timeout,
    }
  }

  fn event(cx: &RunContext, outcome: CheckOutcome, report: Option<GroupReport>) -> CheckEvent {
    CheckEvent {
      job: cx.job_id.clone(),
      step: cx.step_id.clone(),
      desc: cx.desc.clone(),
      outcome,
      keys: report.map(|r| r.keys).unwrap_or_default(),
      error: None,
    }
  }
}

#[async_trait]
impl Runner for EventStep {
  #[instrument(skip_all, fields(job = %cx.job_id, step = %cx.step_id, slot = self.slot.index()))]
  async fn run(&self, cx: &RunContext, check: &Check) -> Result<(), StepError> {
    let sensor = self
      .compiler
      .sensor(
        &cx.scope,
        &self.config.match_group,
        &self.config.pass,
        &self.config.fail,
      )
      .map_err(|source| StepError::Compile {
        step_id: cx.step_id.clone(),
        source,
      })?;
    let sensor = Arc::new(sensor);

    let deadline = self.timeout.map(|t| Instant::now() + t);
    let mut rx = self.slot.receiver().lock().await;
    let mut last: Option<GroupReport> = None;

    loop {
      let expired = async {
        match deadline {
          Some(deadline) => sleep_until(deadline).await,
          None => std::future::pending().await,
        }
      };

      let delivery = tokio::select! {
        _ = cx.cancel.cancelled() => return Err(StepError::Cancelled),
        _ = sleep(self.inactive_timeout) => Err(self.inactive_timeout),
        _ = expired => Err(self.timeout.unwrap_or_default()),
        delivery = rx.recv() => Ok(delivery),
      };

      let mut delivery = match delivery {
        Ok(Some(delivery)) => delivery,
        Ok(None) => {
          return Err(StepError::Closed {
            step_id: cx.step_id.clone(),
          });
        }
        Err(after) => {
          warn!(?after, "no qualifying event");
          self.compiler.observer().match_timeout(&cx.scope);
          let mut event = Self::event(cx, CheckOutcome::MatchFailure, last);
          event.error = Some(format!("timed out after {after:?}"));
          check.record(event);
          return Err(StepError::Timeout {
            step_id: cx.step_id.clone(),
            after,
          });
        }
      };

      let seq = delivery.message.index();
      let scope: Scope = cx.scope.event_seq(seq);
      let payload = delivery.message.shared_payload();
      let evaluate = {
        let sensor = sensor.clone();
        let scope = scope.clone();
        // Templates may block on shared variables.
        tokio::task::spawn_blocking(move || sensor.evaluate(&scope, &payload))
      };

      let evaluated = tokio::select! {
        _ = cx.cancel.cancelled() => {
          delivery.resolve(false);
          return Err(StepError::Cancelled);
        }
        evaluated = evaluate => evaluated,
      };

      let evaluation = match evaluated {
        Ok(Ok(evaluation)) => evaluation,
        Ok(Err(source)) => {
          delivery.resolve(false);
          return Err(StepError::Match {
            step_id: cx.step_id.clone(),
            source,
          });
        }
        Err(e) => {
          delivery.resolve(false);
          return Err(StepError::Aborted {
            step_id: cx.step_id.clone(),
            message: e.to_string(),
          });
        }
      };

      match evaluation.outcome {
        Outcome::Unmatched => {
          delivery.resolve(false);
        }
        Outcome::Pending => {
          debug!(seq, "matched, pass group not satisfied");
          delivery.resolve(false);
          last = Some(evaluation.report);
        }
        Outcome::Failed => {
          delivery.resolve(false);
          warn!(seq, "failure pattern matched");
          check.record(Self::event(cx, CheckOutcome::FailTriggered, Some(evaluation.report)));
          return Err(StepError::FailureMatched {
            step_id: cx.step_id.clone(),
          });
        }
        Outcome::Passed => {
          delivery.resolve(true);
          info!(seq, "step passed");
          check.record(Self::event(cx, CheckOutcome::Pass, Some(evaluation.report)));
          return Ok(());
        }
      }
    }
  }

  async fn stop(&self) {
    self.slot.stop().await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use hookt_pattern::Templater;

  #[test]
  fn test_tag_get_and_set() {
    let tags = Tags::default();
    let templater = Templater::new().with_options([tag_option(tags.clone())]);

    let out = templater
      .render("{{ tag('id', 7) }}-{{ tag('id') }}", &serde_json::Value::Null)
      .unwrap();
    assert_eq!(out, "7-7");
    assert_eq!(
      tags.lock().unwrap().get("id").cloned(),
      Some(Value::from(7))
    );
  }

  #[test]
  fn test_missing_tag_is_an_error() {
    let templater = Templater::new().with_options([tag_option(Tags::default())]);
    let err = templater
      .render("{{ tag('nope') }}", &serde_json::Value::Null)
      .unwrap_err();
    assert!(err.to_string().contains("not found"));
  }
}
