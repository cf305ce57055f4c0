use anyhow::Context;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::environment::CanonicalizedPathBuf;
use crate::environment::Environment;
use crate::exclusions::ExcludeMatcher;
use crate::file_sources::iterate_all_files;
use crate::file_sources::iterate_changed_files;
use crate::format::DispatchOptions;
use crate::format::run_formatters_on_files;
use crate::formatters::FormatterRegistry;
use crate::patch::PatchOutput;
use crate::patch::PatchSink;
use crate::patch::collect_patch;
use crate::stats::RunStats;
use crate::stats::log_actions_and_collect_stats;

#[derive(Debug, Error)]
pub enum RunConfigError {
  #[error("Cannot write a patch when formatting in place.")]
  InPlaceWithPatchOutput,
  #[error("Root directory must be an absolute path: {0}")]
  RootNotAbsolute(PathBuf),
  #[error("Root directory does not exist: {0}")]
  RootNotFound(PathBuf),
  #[error("Exclusions must be either all relative or all absolute.")]
  MixedExclusions,
  #[error("Exclusion is not within the root directory: {0}")]
  ExclusionOutsideRoot(PathBuf),
  #[error("Parallelism must be greater than zero.")]
  ZeroParallelism,
  #[error("Error creating patch output file {}", .path.display())]
  CreatePatchOutput {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Config(#[from] RunConfigError),
  /// Finding the files to format failed.
  #[error(transparent)]
  Discovery(anyhow::Error),
  #[error(transparent)]
  PatchOutput(anyhow::Error),
}

pub struct RunOptions {
  pub root_dir: PathBuf,
  /// Paths relative to the root directory, or absolute paths within it.
  pub excludes: Vec<PathBuf>,
  /// Only format files changed since this git reference.
  pub git_diffbase: Option<String>,
  pub patch_output: Option<PatchOutput>,
  pub in_place: bool,
  pub parallelism: usize,
  pub timeout: Option<Duration>,
}

/// Finds the files, formats them and reports the outcome.
///
/// Invalid options and failures finding the files are returned before
/// anything is formatted or the patch output is created. Failures
/// formatting a file are counted in the returned stats instead.
pub async fn run_pipeline<TEnvironment: Environment>(
  environment: &TEnvironment,
  registry: Arc<FormatterRegistry>,
  options: RunOptions,
) -> Result<RunStats, PipelineError> {
  validate_options(environment, &options)?;
  let root_dir = environment
    .canonicalize(&options.root_dir)
    .map_err(|_| RunConfigError::RootNotFound(options.root_dir.clone()))?;
  let exclude_matcher = ExcludeMatcher::new(resolve_exclusions(environment, &options.root_dir, &root_dir, &options.excludes)?);

  let file_paths = match &options.git_diffbase {
    Some(diffbase) => {
      log_verbose!(environment, "Examining files that have changed in git since {}", diffbase);
      iterate_changed_files(environment, &root_dir, exclude_matcher, diffbase).map_err(PipelineError::Discovery)?
    }
    None => {
      log_verbose!(environment, "Examining all files in {}", root_dir.display());
      iterate_all_files(environment, &root_dir, exclude_matcher)
    }
  };
  let patch_sink = match &options.patch_output {
    Some(patch_output) => Some(open_patch_output(patch_output)?),
    None => None,
  };

  let results = run_formatters_on_files(
    environment,
    registry,
    file_paths,
    DispatchOptions {
      root_dir,
      in_place: options.in_place,
      parallelism: options.parallelism,
      timeout: options.timeout,
    },
  );

  match patch_sink {
    Some(sink) => {
      let (results, patch_handle) = collect_patch(results, sink);
      let stats = log_actions_and_collect_stats(results, options.in_place, environment).await;
      patch_handle
        .await
        .map_err(anyhow::Error::from)
        .and_then(|result| result)
        .context("Error writing patch output")
        .map_err(PipelineError::PatchOutput)?;
      Ok(stats)
    }
    None => Ok(log_actions_and_collect_stats(results, options.in_place, environment).await),
  }
}

fn validate_options(environment: &impl Environment, options: &RunOptions) -> Result<(), RunConfigError> {
  if options.in_place && options.patch_output.is_some() {
    return Err(RunConfigError::InPlaceWithPatchOutput);
  }
  if !environment.is_absolute_path(&options.root_dir) {
    return Err(RunConfigError::RootNotAbsolute(options.root_dir.clone()));
  }
  if options.parallelism == 0 {
    return Err(RunConfigError::ZeroParallelism);
  }
  let absolute_count = options.excludes.iter().filter(|e| environment.is_absolute_path(e)).count();
  if absolute_count > 0 && absolute_count != options.excludes.len() {
    return Err(RunConfigError::MixedExclusions);
  }
  Ok(())
}

fn open_patch_output(patch_output: &PatchOutput) -> Result<PatchSink, RunConfigError> {
  patch_output.open().map_err(|source| RunConfigError::CreatePatchOutput {
    path: match patch_output {
      PatchOutput::Stdout => PathBuf::from("-"),
      PatchOutput::File(file_path) => file_path.clone(),
    },
    source,
  })
}

/// Makes absolute exclusions relative to the root directory.
fn resolve_exclusions(
  environment: &impl Environment,
  root_dir: &Path,
  canonical_root_dir: &CanonicalizedPathBuf,
  excludes: &[PathBuf],
) -> Result<Vec<PathBuf>, RunConfigError> {
  excludes
    .iter()
    .map(|exclude| {
      if !environment.is_absolute_path(exclude) {
        return Ok(exclude.clone());
      }
      exclude
        .strip_prefix(root_dir)
        .or_else(|_| exclude.strip_prefix(canonical_root_dir.as_path()))
        .map(|path| path.to_path_buf())
        .map_err(|_| RunConfigError::ExclusionOutsideRoot(exclude.clone()))
    })
    .collect()
}
