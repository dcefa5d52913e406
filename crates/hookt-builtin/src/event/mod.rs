//! The `event` plugin: fans messages from sibling sources out to its steps.
//!
//! ```yaml
//! plugins:
//!   - uses: inline
//!     id: feed
//!     with: { publish: { file: events.json } }
//!   - uses: event
//!     with:
//!       sources: [feed]
//!       mode: sync
//!       inactive_timeout: 5s
//! steps:
//!   - uses: event
//!     with:
//!       match: { .kind: order }
//!       pass: { .status: shipped }
//!       fail: { .status: cancelled }
//! ```

mod bus;
mod config;
mod delivery;
mod step;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hookt_workflow::{
  Capability, InitContext, Initializer, Job, Plugin, PluginError, Runner, WireContext,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

pub use config::{EventConfig, Mode, StepConfig};

use bus::Bus;
use step::EventStep;

pub const NAME: &str = "event";

/// Decodes a `with` body, treating an absent body as an empty map.
pub(crate) fn decode<T: DeserializeOwned>(plugin: &str, with: &Value) -> Result<T, PluginError> {
  let with = if with.is_null() {
    Value::Object(Default::default())
  } else {
    with.clone()
  };
  serde_json::from_value(with).map_err(|e| PluginError::config(plugin, e))
}

#[derive(Debug, Default)]
pub struct EventCapability;

impl Capability for EventCapability {
  fn name(&self) -> &str {
    NAME
  }

  fn plugin(&self, cx: &WireContext, with: &Value) -> Result<Arc<dyn Plugin>, PluginError> {
    let config: EventConfig = decode(NAME, with)?;
    if config.sources.is_empty() {
      return Err(PluginError::config(NAME, "at least one source is required"));
    }

    let inactive_timeout = config
      .inactive_timeout
      .unwrap_or(cx.config.inactive_timeout);
    let timeout = config.timeout();
    debug!(mode = ?config.mode, ?inactive_timeout, ?timeout, "event plugin configured");

    Ok(Arc::new(EventPlugin {
      bus: Bus::new(config.mode, cx.scope.clone(), cx.compiler.observer().clone()),
      sources: config.sources,
      inactive_timeout,
      timeout,
    }))
  }
}

pub struct EventPlugin {
  bus: Bus,
  sources: Vec<String>,
  inactive_timeout: Duration,
  timeout: Option<Duration>,
}


impl Plugin for EventPlugin {
  fn step(&self, cx: &WireContext, with: &Value) -> Result<Arc<dyn Runner>, PluginError> {
    let config: StepConfig = decode(NAME, with)?;
    let inactive_timeout = config.inactive_timeout.unwrap_or(self.inactive_timeout);
    let slot = self.bus.add_slot()?;
    Ok(Arc::new(EventStep::new(
      config,
      &cx.compiler,
      slot,
      inactive_timeout,
      self.timeout,
    )))
  }

  fn as_initializer(&self) -> Option<&dyn Initializer> {
    Some(self)
  }
}

#[async_trait]
impl Initializer for EventPlugin {
  async fn init(&self, job: &Job, cx: &InitContext) -> Result<(), PluginError> {
    let mut receivers = Vec::with_capacity(self.sources.len());
    for id in &self.sources {
      let instance = job.plugin(id).ok_or_else(|| PluginError::Source {
        source_id: id.clone(),
        message: "no such plugin in job".to_string(),
      })?;
      let subscriber = instance
        .plugin
        .as_subscriber()
        .ok_or_else(|| PluginError::Source {
          source_id: id.clone(),
          message: format!("plugin {:?} does not publish events", instance.uses),
        })?;
      receivers.push(subscriber.subscribe()?);
    }

    debug!(sources = ?self.sources, "starting event bus");
    self.bus.start(receivers, cx.cancel.clone())
  }
}
