//! Workflow execution engine.
//!
//! The `Engine` wires a workflow definition and runs every step of every job
//! concurrently until each reaches a terminal state.

use std::sync::Arc;

use hookt_config::{EngineConfig, WorkflowDef};
use hookt_pattern::{Compiler, Templater};
use hookt_resolver::{Registry, ResolveContext, Resolver, StandardResolver};
use hookt_trace::{Scope, SharedObserver};
use hookt_workflow::{Check, CheckEvent, CheckOutcome, Results, RunContext, StepError, Workflow};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::EngineError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};

/// Outcome of a run that reached the end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
  pub run_id: String,
  pub results: Results,
}

impl RunReport {
  pub fn total(&self) -> usize {
    self.results.steps.passed + self.results.steps.failed
  }

  pub fn is_success(&self) -> bool {
    self.results.steps.failed == 0
  }
}

/// Identifies the step a task belongs to.
struct StepTask {
  job_id: String,
  step_id: String,
  desc: String,
}

/// The workflow execution engine.
///
/// Generic over `N: ExecutionNotifier`. Use `Engine::new()` for a default
/// engine with no-op notifications, or `Engine::with_notifier()` to observe
/// progress.
pub struct Engine<N: ExecutionNotifier = NoopNotifier> {
  resolver: StandardResolver,
  config: EngineConfig,
  templater: Templater,
  observer: SharedObserver,
  notifier: N,
}

impl Engine<NoopNotifier> {
  pub fn new(registry: Registry, config: EngineConfig) -> Self {
    Self::with_notifier(registry, config, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> Engine<N> {
  pub fn with_notifier(registry: Registry, config: EngineConfig, notifier: N) -> Self {
    Self {
      resolver: StandardResolver::new(registry),
      config,
      templater: Templater::new(),
      observer: hookt_trace::noop(),
      notifier,
    }
  }

  /// Sets the observer receiving wiring, pattern and scheduling hooks.
  pub fn observer(mut self, observer: SharedObserver) -> Self {
    self.observer = observer;
    self
  }

  /// Sets the templater, and with it the variables templates share.
  pub fn templater(mut self, templater: Templater) -> Self {
    self.templater = templater;
    self
  }

  /// Parses a YAML or JSON document and runs it.
  pub async fn run_document(
    &self,
    source: &str,
    cancel: CancellationToken,
  ) -> Result<RunReport, EngineError> {
    let def = hookt_config::parse_document(source)?;
    self.run(def, cancel).await
  }

  /// Wires `def` and runs every step.
  ///
  /// Returns once every step has finished, or as soon as `cancel` fires.
  /// A step failure never stops its siblings.
  #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
  pub async fn run(
    &self,
    def: WorkflowDef,
    cancel: CancellationToken,
  ) -> Result<RunReport, EngineError> {
    let run_id = uuid::Uuid::new_v4().to_string();
    tracing::Span::current().record("run_id", run_id.as_str());

    // Background tasks of plugins live exactly as long as the run.
    let run_cancel = cancel.child_token();
    let _guard = run_cancel.clone().drop_guard();

    let result = self.execute(&run_id, def, &cancel, &run_cancel).await;
    match &result {
      Ok(report) => {
        info!(passed = report.results.steps.passed, "run completed");
        self.notifier.notify(ExecutionEvent::RunCompleted {
          run_id: run_id.clone(),
          passed: report.results.steps.passed,
        });
      }
      Err(e) => {
        warn!(error = %e, "run failed");
        self.notifier.notify(ExecutionEvent::RunFailed {
          run_id: run_id.clone(),
          error: e.to_string(),
        });
      }
    }
    result
  }

  async fn execute(
    &self,
    run_id: &str,
    def: WorkflowDef,
    cancel: &CancellationToken,
    run_cancel: &CancellationToken,
  ) -> Result<RunReport, EngineError> {
    let cx = ResolveContext {
      compiler: Compiler::new(self.templater.clone(), self.observer.clone()),
      config: self.config.clone(),
      cancel: run_cancel.clone(),
    };
    let workflow = self.resolver.resolve(def, &cx).await?;

    self.notifier.notify(ExecutionEvent::RunStarted {
      run_id: run_id.to_string(),
      steps: workflow.step_count(),
    });

    let check = Arc::new(Check::new());
    let (tasks, handles): (Vec<_>, Vec<_>) = self
      .spawn_steps(run_id, &workflow, &check, run_cancel)
      .into_iter()
      .unzip();

    let results = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(EngineError::Cancelled),
      results = futures::future::join_all(handles) => results,
    };
    if cancel.is_cancelled() {
      return Err(EngineError::Cancelled);
    }

    for (task, result) in tasks.iter().zip(results) {
      let error = match result {
        Ok(Ok(())) => {
          self.notifier.notify(ExecutionEvent::StepPassed {
            run_id: run_id.to_string(),
            job_id: task.job_id.clone(),
            step_id: task.step_id.clone(),
          });
          continue;
        }
        Ok(Err(e)) => {
          // Assertion failures are recorded by the step itself.
          if !e.is_assertion() {
            self.record_error(&check, task, &e.to_string());
          }
          e.to_string()
        }
        Err(e) => {
          let message = format!("step task failed: {e}");
          self.record_error(&check, task, &message);
          message
        }
      };

      error!(job = %task.job_id, step = %task.step_id, error = %error, "step failed");
      self.notifier.notify(ExecutionEvent::StepFailed {
        run_id: run_id.to_string(),
        job_id: task.job_id.clone(),
        step_id: task.step_id.clone(),
        error,
      });
    }

    let report = RunReport {
      run_id: run_id.to_string(),
      results: check.results(),
    };
    if report.is_success() {
      Ok(report)
    } else {
      Err(EngineError::StepsFailed {
        report: Box::new(report),
      })
    }
  }

  /// Spawns `run` followed by `stop` for every step of every job.
  fn spawn_steps(
    &self,
    run_id: &str,
    workflow: &Workflow,
    check: &Arc<Check>,
    cancel: &CancellationToken,
  ) -> Vec<(StepTask, JoinHandle<Result<(), StepError>>)> {
    let mut tasks = Vec::with_capacity(workflow.step_count());
    for job in &workflow.jobs {
      for step in &job.steps {
        self.notifier.notify(ExecutionEvent::StepStarted {
          run_id: run_id.to_string(),
          job_id: job.id.clone(),
          step_id: step.id.clone(),
        });

        let cx = RunContext {
          run_id: run_id.to_string(),
          job_id: job.id.clone(),
          step_id: step.id.clone(),
          desc: step.desc.clone(),
          cancel: cancel.clone(),
          scope: Scope::new().job(&job.id).step(&step.id),
        };
        let runner = step.runner.clone();
        let check = check.clone();

        let handle = tokio::spawn(async move {
          let result = runner.run(&cx, &check).await;
          runner.stop().await;
          result
        });

        let task = StepTask {
          job_id: job.id.clone(),
          step_id: step.id.clone(),
          desc: step.desc.clone(),
        };
        tasks.push((task, handle));
      }
    }
    tasks
  }

  fn record_error(&self, check: &Check, task: &StepTask, message: &str) {
    check.record(CheckEvent {
      job: task.job_id.clone(),
      step: task.step_id.clone(),
      desc: task.desc.clone(),
      outcome: CheckOutcome::MatchFailure,
      keys: Vec::new(),
      error: Some(message.to_string()),
    });
  }
}
