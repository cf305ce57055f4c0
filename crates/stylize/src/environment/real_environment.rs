use anyhow::Context;
use anyhow::Result;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use super::CanonicalizedPathBuf;
use super::CommandOutput;
use super::DirEntry;
use super::Environment;
use crate::utils::LogLevel;
use crate::utils::Logger;
use crate::utils::LoggerOptions;
use crate::utils::get_stderr_terminal_width;

pub struct RealEnvironmentOptions {
  pub log_level: LogLevel,
}

#[derive(Clone)]
pub struct RealEnvironment {
  logger: Logger,
}

impl RealEnvironment {
  pub fn new(options: &RealEnvironmentOptions) -> RealEnvironment {
    RealEnvironment {
      logger: Logger::new(&LoggerOptions { log_level: options.log_level }),
    }
  }
}

impl Environment for RealEnvironment {
  fn read_file_bytes(&self, file_path: impl AsRef<Path>) -> Result<Vec<u8>> {
    log_verbose!(self, "Reading file: {}", file_path.as_ref().display());
    fs::read(&file_path).with_context(|| format!("Error reading file {}", file_path.as_ref().display()))
  }

  fn write_file_bytes(&self, file_path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    log_verbose!(self, "Writing file: {}", file_path.as_ref().display());
    fs::write(&file_path, bytes).with_context(|| format!("Error writing file {}", file_path.as_ref().display()))
  }

  fn path_exists(&self, file_path: impl AsRef<Path>) -> bool {
    file_path.as_ref().exists()
  }

  fn canonicalize(&self, path: impl AsRef<Path>) -> Result<CanonicalizedPathBuf> {
    // use dunce to avoid UNC paths on Windows
    let path = dunce::canonicalize(&path).with_context(|| format!("Error canonicalizing path {}", path.as_ref().display()))?;
    Ok(CanonicalizedPathBuf::new(path))
  }

  fn is_absolute_path(&self, path: impl AsRef<Path>) -> bool {
    path.as_ref().is_absolute()
  }

  fn dir_info(&self, dir_path: impl AsRef<Path>) -> std::io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(&dir_path)? {
      let Ok(entry) = entry else {
        continue;
      };
      let Ok(file_type) = entry.file_type() else {
        log_verbose!(self, "Skipping unreadable entry: {}", entry.path().display());
        continue;
      };
      if file_type.is_dir() {
        entries.push(DirEntry::Directory(entry.path()));
      } else {
        entries.push(DirEntry::File { path: entry.path() });
      }
    }
    Ok(entries)
  }

  fn cwd(&self) -> Result<PathBuf> {
    std::env::current_dir().context("Error getting the current working directory")
  }

  fn run_command(&self, cwd: &Path, program: &str, args: &[&str]) -> Result<CommandOutput> {
    log_verbose!(self, "Running in {}: {} {}", cwd.display(), program, args.join(" "));
    let output = Command::new(program)
      .args(args)
      .current_dir(cwd)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .output()
      .with_context(|| format!("Error running '{}'", program))?;
    Ok(CommandOutput {
      success: output.status.success(),
      stdout: output.stdout,
      stderr: output.stderr,
    })
  }

  fn log(&self, text: &str) {
    self.logger.log(text);
  }

  fn log_stderr(&self, text: &str) {
    self.logger.log_stderr(text);
  }

  fn write_stderr(&self, text: &str) {
    self.logger.write_stderr(text);
  }

  fn stderr_terminal_width(&self) -> Option<u16> {
    get_stderr_terminal_width()
  }

  fn is_verbose(&self) -> bool {
    self.logger.is_verbose()
  }

  fn available_parallelism(&self) -> usize {
    std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
  }
}
