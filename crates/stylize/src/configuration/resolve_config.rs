use anyhow::Context;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

use super::ConfigFile;
use super::DEFAULT_CONFIG_FILE_NAME;
use super::deserialize_config_file;
use crate::arg_parser::RunArgs;
use crate::environment::Environment;

const CLANG_FORMAT_NAME: &str = "clang-format";

/// Run settings after combining the command line with the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
  /// Absolute path of the directory to process.
  pub root_dir: PathBuf,
  pub config_path: Option<PathBuf>,
  pub excludes: Vec<PathBuf>,
  pub parallelism: usize,
  pub formatter_args: HashMap<String, Vec<String>>,
}

#[derive(Debug, Error)]
pub enum ResolveConfigError {
  #[error("No config file found at {}.", .0.display())]
  NotFound(PathBuf),
  #[error(transparent)]
  Other(#[from] anyhow::Error),
}

pub fn resolve_config_from_args(args: &RunArgs, environment: &impl Environment) -> Result<ResolvedConfig, ResolveConfigError> {
  let cwd = environment.cwd()?;
  let root_dir = match &args.dir {
    Some(dir) => make_absolute(environment, &cwd, Path::new(dir)),
    None => cwd.clone(),
  };

  let config_path = match &args.config {
    Some(config) => {
      let config_path = make_absolute(environment, &cwd, Path::new(config));
      if !environment.path_exists(&config_path) {
        return Err(ResolveConfigError::NotFound(config_path));
      }
      Some(config_path)
    }
    None => Some(root_dir.join(DEFAULT_CONFIG_FILE_NAME)).filter(|path| environment.path_exists(path)),
  };

  let config_file = match &config_path {
    Some(config_path) => {
      log_verbose!(environment, "Using config file: {}", config_path.display());
      read_config_file(environment, config_path)?
    }
    None => ConfigFile::default(),
  };

  let mut formatter_args = config_file.formatter_args;
  if let Some(clang_style) = &args.clang_style {
    formatter_args
      .entry(CLANG_FORMAT_NAME.to_string())
      .or_default()
      .push(format!("-style={}", clang_style));
  }

  Ok(ResolvedConfig {
    root_dir,
    config_path,
    excludes: config_file.excludes.iter().chain(args.excludes.iter()).map(PathBuf::from).collect(),
    parallelism: args
      .parallelism
      .or(config_file.parallelism)
      .unwrap_or_else(|| environment.available_parallelism()),
    formatter_args,
  })
}

fn read_config_file(environment: &impl Environment, config_path: &Path) -> anyhow::Result<ConfigFile> {
  let bytes = environment.read_file_bytes(config_path)?;
  let text = String::from_utf8(bytes).with_context(|| format!("Config file is not valid UTF-8: {}", config_path.display()))?;
  deserialize_config_file(&text).with_context(|| format!("Error deserializing config file {}", config_path.display()))
}

fn make_absolute(environment: &impl Environment, cwd: &Path, path: &Path) -> PathBuf {
  if environment.is_absolute_path(path) { path.to_path_buf() } else { cwd.join(path) }
}
