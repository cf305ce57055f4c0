use anyhow::Result;
use std::path::Path;
use std::path::PathBuf;

use super::CanonicalizedPathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEntry {
  Directory(PathBuf),
  File { path: PathBuf },
}

impl DirEntry {
  pub fn path(&self) -> &Path {
    match self {
      DirEntry::Directory(path) => path,
      DirEntry::File { path } => path,
    }
  }
}

/// Output of a finished child process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
  pub success: bool,
  pub stdout: Vec<u8>,
  pub stderr: Vec<u8>,
}

impl CommandOutput {
  pub fn stdout_text(&self) -> String {
    String::from_utf8_lossy(&self.stdout).to_string()
  }

  pub fn stderr_text(&self) -> String {
    String::from_utf8_lossy(&self.stderr).trim().to_string()
  }
}

pub trait Environment: Clone + Send + Sync + 'static {
  fn read_file_bytes(&self, file_path: impl AsRef<Path>) -> Result<Vec<u8>>;
  fn write_file_bytes(&self, file_path: impl AsRef<Path>, bytes: &[u8]) -> Result<()>;
  fn path_exists(&self, file_path: impl AsRef<Path>) -> bool;
  fn canonicalize(&self, path: impl AsRef<Path>) -> Result<CanonicalizedPathBuf>;
  fn is_absolute_path(&self, path: impl AsRef<Path>) -> bool;
  /// Lists the direct children of a directory.
  fn dir_info(&self, dir_path: impl AsRef<Path>) -> std::io::Result<Vec<DirEntry>>;
  fn cwd(&self) -> Result<PathBuf>;
  /// Runs a program to completion in the provided directory.
  fn run_command(&self, cwd: &Path, program: &str, args: &[&str]) -> Result<CommandOutput>;
  fn log(&self, text: &str);
  /// Logs a line to stderr.
  fn log_stderr(&self, text: &str);
  /// Writes text to stderr as-is without appending a newline.
  fn write_stderr(&self, text: &str);
  /// Width of the terminal attached to stderr or `None` when stderr is not
  /// an interactive terminal.
  fn stderr_terminal_width(&self) -> Option<u16>;
  fn is_verbose(&self) -> bool;
  fn available_parallelism(&self) -> usize;
}

// use a macro here so the expression provided is only evaluated when in verbose mode
macro_rules! log_verbose {
  ($environment:expr, $($arg:tt)*) => {
    if $environment.is_verbose() {
      let mut text = String::from("[VERBOSE] ");
      text.push_str(&format!($($arg)*));
      $environment.log_stderr(&text);
    }
  }
}

macro_rules! log_warn {
  ($environment:expr, $($arg:tt)*) => {
    $environment.log_stderr(&format!($($arg)*));
  }
}
