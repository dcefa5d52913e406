use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Problem};

/// Prefix reserved for identifiers generated by hookt itself.
pub const RESERVED_PREFIX: char = '#';

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDef {
  #[serde(default)]
  pub jobs: Vec<JobDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default)]
  pub plugins: Vec<PluginDef>,
  #[serde(default)]
  pub steps: Vec<StepDef>,
}

impl JobDef {
  /// The job's identifier, or `#job-{index}` when none was given.
  pub fn id_or_default(&self, index: usize) -> String {
    nonempty(self.id.as_deref()).unwrap_or_else(|| format!("{RESERVED_PREFIX}job-{index}"))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginDef {
  pub uses: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  /// Plugin-specific body, decoded by the plugin itself.
  #[serde(default)]
  pub with: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDef {
  pub uses: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default)]
  pub desc: String,
  /// Step-specific body, decoded by the plugin that runs the step.
  #[serde(default)]
  pub with: Value,
}

impl StepDef {
  /// The step's identifier, or `#step-{index}` when none was given.
  pub fn id_or_default(&self, index: usize) -> String {
    nonempty(self.id.as_deref()).unwrap_or_else(|| format!("{RESERVED_PREFIX}step-{index}"))
  }
}

fn nonempty(id: Option<&str>) -> Option<String> {
  id.filter(|id| !id.is_empty()).map(str::to_string)
}

/// Parses a YAML or JSON workflow document.
///
/// Every job, plugin and step is decoded on its own so that all problems in
/// the document are reported together.
pub fn parse_document(source: &str) -> Result<WorkflowDef, ConfigError> {
  if source.trim().is_empty() {
    return Ok(WorkflowDef::default());
  }
  let tree: Value = serde_yaml_ng::from_str(source)?;
  decode(tree)
}

/// Decodes an already parsed document tree.
pub fn decode(tree: Value) -> Result<WorkflowDef, ConfigError> {
  #[derive(Deserialize)]
  #[serde(deny_unknown_fields)]
  struct RawWorkflow {
    #[serde(default)]
    jobs: Vec<Value>,
  }

  #[derive(Deserialize)]
  #[serde(deny_unknown_fields)]
  struct RawJob {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    plugins: Vec<Value>,
    #[serde(default)]
    steps: Vec<Value>,
  }

  let mut problems = Vec::new();

  let tree = if tree.is_null() {
    Value::Object(Default::default())
  } else {
    tree
  };
  let raw: RawWorkflow = match from_value("workflow", tree) {
    Ok(raw) => raw,
    Err(problem) => return Err(ConfigError::invalid(vec![problem])),
  };

  let mut workflow = WorkflowDef::default();
  let mut job_ids = HashSet::new();

  for (i, job) in raw.jobs.into_iter().enumerate() {
    let path = format!("jobs[{i}]");
    let raw: RawJob = match from_value(&path, job) {
      Ok(raw) => raw,
      Err(problem) => {
        problems.push(problem);
        continue;
      }
    };

    let mut def = JobDef {
      id: raw.id,
      ..Default::default()
    };
    check_id(&path, def.id.as_deref(), &mut problems);
    let job_id = def.id_or_default(i);
    if !job_ids.insert(job_id.clone()) {
      problems.push(Problem::new(&path, format!("duplicate job id {job_id:?}")));
    }

    for (k, plugin) in raw.plugins.into_iter().enumerate() {
      let path = format!("{path}.plugins[{k}]");
      match from_value::<PluginDef>(&path, plugin) {
        Ok(plugin) => {
          check_id(&path, plugin.id.as_deref(), &mut problems);
          def.plugins.push(plugin);
        }
        Err(problem) => problems.push(problem),
      }
    }

    let mut step_ids = HashSet::new();
    for (k, step) in raw.steps.into_iter().enumerate() {
      let path = format!("{path}.steps[{k}]");
      match from_value::<StepDef>(&path, step) {
        Ok(step) => {
          check_id(&path, step.id.as_deref(), &mut problems);
          let step_id = step.id_or_default(k);
          if !step_ids.insert(step_id.clone()) {
            problems.push(Problem::new(&path, format!("duplicate step id {step_id:?}")));
          }
          def.steps.push(step);
        }
        Err(problem) => problems.push(problem),
      }
    }

    workflow.jobs.push(def);
  }

  if problems.is_empty() {
    Ok(workflow)
  } else {
    Err(ConfigError::invalid(problems))
  }
}

fn from_value<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, Problem> {
  serde_json::from_value(value).map_err(|e| Problem::new(path, e.to_string()))
}

fn check_id(path: &str, id: Option<&str>, problems: &mut Vec<Problem>) {
  if let Some(id) = id.filter(|id| id.starts_with(RESERVED_PREFIX)) {
    problems.push(Problem::new(
      path,
      format!("id {id:?} cannot start with {RESERVED_PREFIX:?}"),
    ));
  }
}
