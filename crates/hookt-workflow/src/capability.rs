//! Plugin contracts.
//!
//! A [`Capability`] is a named factory registered once per process. Every
//! `plugins:` entry in a job asks the capability for a fresh [`Plugin`]
//! instance, and every step bound to that instance asks the plugin for a
//! [`Runner`]. A plugin may additionally be an [`Initializer`] (called once the
//! whole job is wired) or a [`Subscriber`] (a source of messages).

use std::sync::Arc;

use async_trait::async_trait;
use hookt_config::EngineConfig;
use hookt_pattern::Compiler;
use hookt_trace::Scope;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::check::Check;
use crate::error::{PluginError, StepError};
use crate::message::Message;
use crate::model::Job;

/// Everything a plugin or step factory may need while decoding its body.
#[derive(Clone)]
pub struct WireContext {
  /// Shared pattern/template compiler of the run.
  pub compiler: Compiler,
  pub config: EngineConfig,
  /// Job (and, for steps, step) the object is being wired for.
  pub scope: Scope,
}

/// Passed to [`Initializer::init`].
#[derive(Clone)]
pub struct InitContext {
  /// Cancelled when the run ends; background tasks must stop on it.
  pub cancel: CancellationToken,
  pub scope: Scope,
}

/// Passed to [`Runner::run`].
#[derive(Clone)]
pub struct RunContext {
  pub run_id: String,
  pub job_id: String,
  pub step_id: String,
  pub desc: String,
  pub cancel: CancellationToken,
  pub scope: Scope,
}

/// A registered plugin implementation, selected by `uses`.
pub trait Capability: Send + Sync {
  fn name(&self) -> &str;

  /// Creates a plugin instance and decodes its `with` body into it.
  fn plugin(&self, cx: &WireContext, with: &Value) -> Result<Arc<dyn Plugin>, PluginError>;
}

/// A per-job plugin instance.
pub trait Plugin: Send + Sync {
  /// Creates a step runner and decodes its `with` body into it.
  fn step(&self, cx: &WireContext, with: &Value) -> Result<Arc<dyn Runner>, PluginError>;

  fn as_initializer(&self) -> Option<&dyn Initializer> {
    None
  }

  fn as_subscriber(&self) -> Option<&dyn Subscriber> {
    None
  }
}

#[async_trait]
pub trait Initializer: Send + Sync {
  /// Called once every plugin and step of `job` is wired, in declaration order.
  async fn init(&self, job: &Job, cx: &InitContext) -> Result<(), PluginError>;
}

/// A source of messages.
pub trait Subscriber: Send + Sync {
  /// Hands out the message stream. Sources support a single subscriber.
  fn subscribe(&self) -> Result<mpsc::Receiver<Message>, PluginError>;
}

/// The Run/Stop contract of a step.
#[async_trait]
pub trait Runner: Send + Sync {
  /// Runs the step to a terminal state, recording its outcome in `check`.
  async fn run(&self, cx: &RunContext, check: &Check) -> Result<(), StepError>;

  /// Releases whatever the step holds. Called exactly once, after `run`.
  async fn stop(&self);
}
