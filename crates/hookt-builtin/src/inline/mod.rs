//! The `inline` plugin: publishes messages read from a file and from its own
//! configuration.

mod config;

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use hookt_pattern::Templater;
use hookt_trace::{Scope, SharedObserver};
use hookt_workflow::{
  Capability, InitContext, Initializer, Job, Message, Plugin, PluginError, Runner, Subscriber,
  WireContext,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use config::{InlineConfig, PublishConfig};

use crate::event::decode;

pub const NAME: &str = "inline";

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Default)]
pub struct InlineCapability;

impl Capability for InlineCapability {
  fn name(&self) -> &str {
    NAME
  }

  fn plugin(&self, cx: &WireContext, with: &Value) -> Result<Arc<dyn Plugin>, PluginError> {
    let config: InlineConfig = decode(NAME, with)?;
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    Ok(Arc::new(InlinePlugin {
      config,
      templater: cx.compiler.templater().clone(),
      observer: cx.compiler.observer().clone(),
      scope: cx.scope.clone(),
      tx: Mutex::new(Some(tx)),
      rx: Mutex::new(Some(rx)),
    }))
  }
}

pub struct InlinePlugin {
  config: InlineConfig,
  templater: Templater,
  observer: SharedObserver,
  scope: Scope,
  tx: Mutex<Option<mpsc::Sender<Message>>>,
  rx: Mutex<Option<mpsc::Receiver<Message>>>,
}

impl Plugin for InlinePlugin {
  fn step(&self, _cx: &WireContext, _with: &Value) -> Result<Arc<dyn Runner>, PluginError> {
    Err(PluginError::Unsupported {
      plugin: NAME.to_string(),
      what: "steps".to_string(),
    })
  }

  fn as_initializer(&self) -> Option<&dyn Initializer> {
    Some(self)
  }

  fn as_subscriber(&self) -> Option<&dyn Subscriber> {
    Some(self)
  }
}

impl Subscriber for InlinePlugin {
  fn subscribe(&self) -> Result<mpsc::Receiver<Message>, PluginError> {
    self
      .rx
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
      .ok_or_else(|| PluginError::AlreadySubscribed {
        plugin: NAME.to_string(),
      })
  }
}

#[async_trait]
impl Initializer for InlinePlugin {
  async fn init(&self, _job: &Job, cx: &InitContext) -> Result<(), PluginError> {
    let tx = self
      .tx
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
      .ok_or_else(|| PluginError::init("inline source already initialised"))?;

    let content = match &self.config.publish.file {
      Some(file) => {
        let path = self
          .templater
          .render(file, &Value::Null)
          .map_err(|e| PluginError::config(NAME, e))?;
        debug!(path = %path, "reading inline source");
        let content = tokio::fs::read_to_string(&path)
          .await
          .map_err(|e| PluginError::init(format!("reading {path:?}: {e}")))?;
        Some(content)
      }
      None => None,
    };

    let publisher = Publisher {
      tx,
      cancel: cx.cancel.clone(),
      scope: self.scope.clone(),
      observer: self.observer.clone(),
      seq: 0,
    };
    tokio::spawn(publisher.run(content, self.config.publish.messages.clone()));
    Ok(())
  }
}

struct Publisher {
  tx: mpsc::Sender<Message>,
  cancel: CancellationToken,
  scope: Scope,
  observer: SharedObserver,
  seq: usize,
}

impl Publisher {
  async fn run(mut self, content: Option<String>, messages: Vec<Value>) {
    let mut values = Vec::new();
    let mut complete = true;
    if let Some(content) = content {
      for value in serde_json::Deserializer::from_str(&content).into_iter::<Value>() {
        match value {
          Ok(value) => values.push(value),
          Err(e) => {
            error!(error = %e, "invalid JSON in inline source");
            complete = false;
            break;
          }
        }
      }
    }
    if complete {
      values.extend(messages);
    }

    for value in values {
      let items = match value {
        Value::Array(items) => items,
        value @ Value::Object(_) => vec![value],
        other => {
          error!(value = %other, "inline source publishes objects or arrays of them");
          return;
        }
      };
      for item in items {
        if !self.publish(item).await {
          return;
        }
      }
    }
    info!(published = self.seq, "inline source finished");
  }

  async fn publish(&mut self, payload: Value) -> bool {
    let seq = self.seq;
    let scope = self.scope.event_seq(seq);
    self.observer.before_publish(&scope, seq);

    let sent = tokio::select! {
      _ = self.cancel.cancelled() => false,
      sent = self.tx.send(Message::new(seq, payload)) => sent.is_ok(),
    };
    if sent {
      self.observer.publish(&scope, seq);
      self.seq += 1;
    }
    sent
  }
}
