//! hookt Engine
//!
//! Runs a workflow: wires it through the capability registry, then drives the
//! `run`/`stop` contract of every step concurrently and collects their
//! outcomes.
//!
//! # Usage
//!
//! ```ignore
//! use hookt_engine::{Engine, EngineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = Engine::new(hookt_builtin::registry(), EngineConfig::default());
//! let report = engine.run_document(&source, CancellationToken::new()).await?;
//! println!("{} passed", report.results.steps.passed);
//! ```

mod engine;
mod error;
mod events;

pub use engine::{Engine, RunReport};
pub use error::EngineError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};

pub use hookt_config::EngineConfig;
pub use hookt_workflow::{CheckEvent, CheckOutcome, Results, StepCounts};
