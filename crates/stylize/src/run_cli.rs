use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::arg_parser::CliArgs;
use crate::arg_parser::CliCommand;
use crate::arg_parser::ParseArgsError;
use crate::arg_parser::RunArgs;
use crate::configuration::ResolveConfigError;
use crate::configuration::resolve_config_from_args;
use crate::environment::Environment;
use crate::formatters::Formatter;
use crate::formatters::FormatterRegistry;
use crate::formatters::RegistryError;
use crate::formatters::get_builtin_formatters;
use crate::patch::PatchOutput;
use crate::pipeline::PipelineError;
use crate::pipeline::RunOptions;
use crate::pipeline::run_pipeline;

const FAILED_EXIT_CODE: i32 = 1;
const ARGS_EXIT_CODE: i32 = 10;
const CONFIG_EXIT_CODE: i32 = 11;

#[derive(Debug, Error)]
#[error("{inner:#}")]
pub struct AppError {
  pub inner: anyhow::Error,
  pub exit_code: i32,
}

impl AppError {
  fn new(inner: anyhow::Error, exit_code: i32) -> Self {
    Self { inner, exit_code }
  }
}

impl From<anyhow::Error> for AppError {
  fn from(inner: anyhow::Error) -> Self {
    AppError::new(inner, FAILED_EXIT_CODE)
  }
}

impl From<ParseArgsError> for AppError {
  fn from(inner: ParseArgsError) -> Self {
    AppError::new(inner.into(), ARGS_EXIT_CODE)
  }
}

impl From<ResolveConfigError> for AppError {
  fn from(inner: ResolveConfigError) -> Self {
    AppError::new(inner.into(), CONFIG_EXIT_CODE)
  }
}

impl From<RegistryError> for AppError {
  fn from(inner: RegistryError) -> Self {
    AppError::new(inner.into(), CONFIG_EXIT_CODE)
  }
}

impl From<PipelineError> for AppError {
  fn from(inner: PipelineError) -> Self {
    let exit_code = match &inner {
      PipelineError::Config(_) | PipelineError::Discovery(_) => CONFIG_EXIT_CODE,
      PipelineError::PatchOutput(_) => FAILED_EXIT_CODE,
    };
    AppError::new(inner.into(), exit_code)
  }
}

/// Gets the formatters the registry is built from, given the user
/// provided arguments keyed by formatter name.
pub type GetFormatters = dyn Fn(&HashMap<String, Vec<String>>) -> Vec<Arc<dyn Formatter>>;

pub fn get_builtin_formatter_list(formatter_args: &HashMap<String, Vec<String>>) -> Vec<Arc<dyn Formatter>> {
  get_builtin_formatters(formatter_args)
    .into_iter()
    .map(|formatter| Arc::new(formatter) as Arc<dyn Formatter>)
    .collect()
}

pub async fn run_cli<TEnvironment: Environment>(args: &CliArgs, environment: &TEnvironment, get_formatters: &GetFormatters) -> Result<(), AppError> {
  match &args.command {
    CliCommand::Help(text) => {
      environment.log(text);
      Ok(())
    }
    CliCommand::Version => {
      environment.log(&format!("stylize {}", env!("CARGO_PKG_VERSION")));
      Ok(())
    }
    CliCommand::Run(run_args) => run_formatting(run_args, environment, get_formatters).await,
  }
}

async fn run_formatting<TEnvironment: Environment>(args: &RunArgs, environment: &TEnvironment, get_formatters: &GetFormatters) -> Result<(), AppError> {
  let config = resolve_config_from_args(args, environment)?;
  let registry = build_registry(get_formatters(&config.formatter_args), environment)?;
  if registry.is_empty() {
    log_warn!(environment, "WARNING: None of the supported formatters are installed.");
  } else {
    log_verbose!(environment, "Formatters: {}", registry.formatter_names().join(", "));
  }
  let stats = run_pipeline(
    environment,
    Arc::new(registry),
    RunOptions {
      root_dir: config.root_dir,
      excludes: config.excludes,
      git_diffbase: args.git_diffbase.clone(),
      patch_output: args.patch_output.as_deref().map(PatchOutput::from_arg),
      in_place: args.in_place,
      parallelism: config.parallelism,
      timeout: args.timeout_secs.map(Duration::from_secs),
    },
  )
  .await?;

  if stats.errored > 0 {
    Err(anyhow!("Had {} error(s) formatting.", stats.errored).into())
  } else if !args.in_place && stats.changed > 0 {
    Err(anyhow!("Found {} not formatted file(s).", stats.changed).into())
  } else {
    Ok(())
  }
}

fn build_registry(formatters: Vec<Arc<dyn Formatter>>, environment: &impl Environment) -> Result<FormatterRegistry, RegistryError> {
  let mut registry = FormatterRegistry::new();
  for formatter in formatters {
    if formatter.is_installed() {
      registry.register(formatter)?;
    } else {
      log_verbose!(environment, "Skipping {}: not installed", formatter.name());
    }
  }
  Ok(registry)
}
