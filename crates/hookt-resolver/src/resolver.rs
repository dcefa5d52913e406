use async_trait::async_trait;
use hookt_config::{EngineConfig, JobDef, WorkflowDef};
use hookt_pattern::Compiler;
use hookt_trace::Scope;
use hookt_workflow::{InitContext, Job, PluginInstance, Step, WireContext, Workflow};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ResolveError;
use crate::registry::Registry;

/// Shared state handed to every plugin while a workflow is wired.
#[derive(Clone)]
pub struct ResolveContext {
  pub compiler: Compiler,
  pub config: EngineConfig,
  /// Run-scoped token passed to initializers for their background tasks.
  pub cancel: CancellationToken,
}

/// Resolver transforms a WorkflowDef into a wired Workflow.
#[async_trait]
pub trait Resolver: Send + Sync {
  /// Wire a workflow definition.
  ///
  /// For each job, in order:
  /// 1. Creates a plugin instance per `plugins` entry and decodes its body
  /// 2. Binds each step to a plugin instance and decodes its body
  /// 3. Initialises every plugin instance in declaration order
  async fn resolve(&self, def: WorkflowDef, cx: &ResolveContext) -> Result<Workflow, ResolveError>;
}

/// Standard resolver implementation backed by a capability registry.
pub struct StandardResolver {
  registry: Registry,
}

impl StandardResolver {
  pub fn new(registry: Registry) -> Self {
    Self { registry }
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  /// Decode phase: creates every plugin instance and step runner of a job.
  fn wire_job(&self, index: usize, def: JobDef, cx: &ResolveContext) -> Result<Job, ResolveError> {
    let observer = cx.compiler.observer();
    let job_id = def.id_or_default(index);
    let scope = Scope::new().job(&job_id);

    debug!(index, job = %job_id, "wiring job");
    observer.wire_job(index, &job_id);

    let wire = WireContext {
      compiler: cx.compiler.clone(),
      config: cx.config.clone(),
      scope: scope.clone(),
    };

    let mut plugins = Vec::with_capacity(def.plugins.len());
    for (k, plugin) in def.plugins.into_iter().enumerate() {
      let capability = self
        .registry
        .get(&plugin.uses)
        .ok_or_else(|| ResolveError::NotFound {
          job_id: job_id.clone(),
          name: plugin.uses.clone(),
        })?;

      debug!(index = k, plugin = %plugin.uses, with = %plugin.with, "wiring plugin");

      let instance =
        capability
          .plugin(&wire, &plugin.with)
          .map_err(|source| ResolveError::Plugin {
            job_id: job_id.clone(),
            uses: plugin.uses.clone(),
            source,
          })?;

      observer.wire_plugin(&scope, k, &plugin.uses, &plugin.with);

      plugins.push(PluginInstance {
        id: plugin.id,
        uses: plugin.uses,
        plugin: instance,
      });
    }

    let mut steps = Vec::with_capacity(def.steps.len());
    for (k, step) in def.steps.into_iter().enumerate() {
      let step_id = step.id_or_default(k);
      let owner = self.bind(&job_id, &step_id, &step.uses, &plugins)?;

      let cx = WireContext {
        scope: scope.step(&step_id),
        ..wire.clone()
      };
      let runner = owner
        .plugin
        .step(&cx, &step.with)
        .map_err(|source| ResolveError::Step {
          job_id: job_id.clone(),
          step_id: step_id.clone(),
          uses: step.uses.clone(),
          source,
        })?;

      debug!(id = %step_id, step = %step.uses, with = %step.with, "wiring step");
      observer.wire_step(&cx.scope, k, &step.uses, &step.with);

      steps.push(Step {
        id: step_id,
        desc: step.desc,
        uses: step.uses,
        runner,
      });
    }

    Ok(Job {
      id: job_id,
      plugins,
      steps,
    })
  }

  /// Finds the plugin instance a step runs on.
  ///
  /// `uses` names a plugin instance of the job by id, or else a registered
  /// capability, in which case the job's first instance of it is used.
  fn bind<'a>(
    &self,
    job_id: &str,
    step_id: &str,
    uses: &str,
    plugins: &'a [PluginInstance],
  ) -> Result<&'a PluginInstance, ResolveError> {
    if let Some(instance) = plugins.iter().find(|p| p.id.as_deref() == Some(uses)) {
      return Ok(instance);
    }
    if !self.registry.contains(uses) {
      return Err(ResolveError::NotFound {
        job_id: job_id.to_string(),
        name: uses.to_string(),
      });
    }
    plugins
      .iter()
      .find(|p| p.uses == uses)
      .ok_or_else(|| ResolveError::Unbound {
        job_id: job_id.to_string(),
        step_id: step_id.to_string(),
        uses: uses.to_string(),
      })
  }

  /// Init phase: every plugin sees the fully wired job.
  async fn init_job(&self, job: &Job, cx: &ResolveContext) -> Result<(), ResolveError> {
    let init_cx = InitContext {
      cancel: cx.cancel.clone(),
      scope: Scope::new().job(&job.id),
    };

    for (k, instance) in job.plugins.iter().enumerate() {
      let Some(initializer) = instance.plugin.as_initializer() else {
        continue;
      };

      debug!(index = k, plugin = %instance.uses, "initializing plugin");

      initializer
        .init(job, &init_cx)
        .await
        .map_err(|source| ResolveError::Init {
          job_id: job.id.clone(),
          plugin: instance.id.clone().unwrap_or_else(|| instance.uses.clone()),
          source,
        })?;
    }
    Ok(())
  }
}

#[async_trait]
impl Resolver for StandardResolver {
  async fn resolve(&self, def: WorkflowDef, cx: &ResolveContext) -> Result<Workflow, ResolveError> {
    let mut workflow = Workflow::default();
    for (i, job) in def.jobs.into_iter().enumerate() {
      let job = self.wire_job(i, job, cx)?;
      self.init_job(&job, cx).await?;
      workflow.jobs.push(job);
    }
    Ok(workflow)
  }
}
