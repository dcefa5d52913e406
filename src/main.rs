use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hookt_engine::{Engine, EngineConfig, EngineError, RunReport};
use hookt_pattern::{Templater, Vars};
use hookt_trace::LogObserver;

/// hookt - declarative assertions against event streams
#[derive(Parser)]
#[command(name = "hookt")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Log at debug level and trace every pattern and scheduling hook
  #[arg(long, global = true)]
  debug: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow
  Run {
    /// Path to the workflow file (YAML or JSON)
    workflow_file: PathBuf,

    /// Output format of the results
    #[arg(long, value_enum, default_value_t = Output::Yaml)]
    output: Output,

    /// Default inactivity timeout of event steps (e.g. 30s, 1m30s)
    #[arg(long)]
    inactive_timeout: Option<String>,

    /// Preset a template variable, as NAME=VALUE. VALUE is parsed as YAML.
    #[arg(long = "var", value_name = "NAME=VALUE")]
    vars: Vec<String>,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum Output {
  Yaml,
  Json,
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();
  init_tracing(cli.debug);

  match cli.command {
    Commands::Run {
      workflow_file,
      output,
      inactive_timeout,
      vars,
    } => {
      let mut config = EngineConfig::default();
      if let Some(raw) = inactive_timeout {
        config.inactive_timeout = hookt_config::parse_duration(&raw)
          .with_context(|| format!("invalid --inactive-timeout {raw:?}"))?;
      }
      let templater = Templater::with_vars(parse_vars(&vars)?);

      let rt = tokio::runtime::Runtime::new()?;
      let result = rt.block_on(run_workflow(workflow_file, config, templater, cli.debug));
      // Templates blocked on a variable that is never stored would keep the
      // runtime alive.
      rt.shutdown_timeout(Duration::from_secs(1));
      let report = match result? {
        Ok(report) => report,
        Err(report) => {
          print_report(&report, output)?;
          return Ok(ExitCode::FAILURE);
        }
      };
      print_report(&report, output)?;
      Ok(ExitCode::SUCCESS)
    }
  }
}

fn init_tracing(debug: bool) {
  let default = if debug { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

fn parse_vars(raw: &[String]) -> Result<Vars> {
  let vars = Vars::new();
  for entry in raw {
    let Some((name, value)) = entry.split_once('=') else {
      bail!("invalid --var {entry:?}: expected NAME=VALUE");
    };
    let value: serde_json::Value = serde_yaml_ng::from_str(value)
      .with_context(|| format!("invalid value for --var {name}"))?;
    vars.store(name.to_string(), value);
  }
  Ok(vars)
}

/// Runs the workflow. The inner error carries the report of a run whose steps
/// failed.
async fn run_workflow(
  workflow_file: PathBuf,
  config: EngineConfig,
  templater: Templater,
  debug: bool,
) -> Result<Result<RunReport, RunReport>> {
  let source = tokio::fs::read_to_string(&workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  let mut engine = Engine::new(hookt_builtin::registry(), config).templater(templater);
  if debug {
    engine = engine.observer(Arc::new(LogObserver));
  }

  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupted, cancelling run");
      trigger.cancel();
    }
  });

  match engine.run_document(&source, cancel).await {
    Ok(report) => {
      info!(run_id = %report.run_id, passed = report.results.steps.passed, "all steps passed");
      Ok(Ok(report))
    }
    Err(EngineError::StepsFailed { report }) => Ok(Err(*report)),
    Err(e) => Err(e).with_context(|| format!("failed to run {}", workflow_file.display())),
  }
}

fn print_report(report: &RunReport, output: Output) -> Result<()> {
  let rendered = match output {
    Output::Yaml => serde_yaml_ng::to_string(report)?,
    Output::Json => serde_json::to_string_pretty(report)?,
  };
  println!("{}", rendered.trim_end());
  Ok(())
}
