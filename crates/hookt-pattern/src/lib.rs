//! hookt Pattern
//!
//! Compiles assertion groups (a mapping of path query → literal or template)
//! and evaluates them against JSON values.
//!
//! ```yaml
//! match:
//!   .kind: order          # literal, compared loosely
//!   .id: true             # present
//! pass:
//!   .total: "{{ value > 10 }}"   # template, boolean verdict
//! ```
//!
//! A [`Sensor`] bundles the match, pass and fail groups of a step.

mod compare;
mod error;
mod pattern;
mod query;
mod sensor;
mod template;

pub use compare::{equal, render};
pub use error::{CompileError, MatchError};
pub use pattern::{Compiler, GroupReport, KeyOutcome, PatternGroup};
pub use query::{Query, QueryError};
pub use sensor::{Evaluation, Outcome, Sensor};
pub use template::{TemplateOption, Templater, Vars, xrand};

// Re-exported so callers can write template options without a direct dependency.
pub use minijinja;
