//! hookt Workflow
//!
//! The wired form of a workflow: jobs holding plugin instances and steps
//! bound to concrete implementations, plus the contracts those
//! implementations fulfil and the results aggregator steps report into.

mod capability;
mod check;
mod error;
mod message;
mod model;

pub use capability::{
  Capability, InitContext, Initializer, Plugin, RunContext, Runner, Subscriber, WireContext,
};
pub use check::{Check, CheckEvent, CheckOutcome, Results, StepCounts};
pub use error::{PluginError, StepError};
pub use message::Message;
pub use model::{Job, PluginInstance, Step, Workflow};
