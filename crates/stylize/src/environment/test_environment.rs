use anyhow::Result;
use anyhow::bail;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use super::CanonicalizedPathBuf;
use super::CommandOutput;
use super::DirEntry;
use super::Environment;

#[derive(Default)]
struct TestEnvironmentState {
  files: HashMap<PathBuf, Vec<u8>>,
  directories: HashSet<PathBuf>,
  unreadable_dirs: HashSet<PathBuf>,
  read_dirs: Vec<PathBuf>,
  command_outputs: HashMap<String, CommandOutput>,
  logged_messages: Vec<String>,
  logged_errors: Vec<String>,
  stderr_text: String,
  terminal_width: Option<u16>,
  is_verbose: bool,
  cwd: PathBuf,
}

/// In-memory environment used by the tests.
#[derive(Clone)]
pub struct TestEnvironment {
  state: Arc<Mutex<TestEnvironmentState>>,
}

impl TestEnvironment {
  pub fn new() -> TestEnvironment {
    let env = TestEnvironment {
      state: Default::default(),
    };
    env.state.lock().cwd = PathBuf::from("/");
    env.mk_dir_all("/");
    env
  }

  pub fn write_file(&self, file_path: impl AsRef<Path>, text: &str) {
    self.write_file_bytes(file_path, text.as_bytes()).unwrap();
  }

  pub fn read_file(&self, file_path: impl AsRef<Path>) -> String {
    String::from_utf8(self.read_file_bytes(file_path).unwrap()).unwrap()
  }

  pub fn mk_dir_all(&self, dir_path: impl AsRef<Path>) {
    let mut state = self.state.lock();
    let mut current = Some(dir_path.as_ref());
    while let Some(path) = current {
      state.directories.insert(path.to_path_buf());
      current = path.parent();
    }
  }

  /// Makes reading the provided directory fail.
  pub fn set_dir_unreadable(&self, dir_path: impl AsRef<Path>) {
    self.mk_dir_all(&dir_path);
    self.state.lock().unreadable_dirs.insert(dir_path.as_ref().to_path_buf());
  }

  /// Directories read so far, in read order.
  pub fn read_dirs(&self) -> Vec<PathBuf> {
    self.state.lock().read_dirs.clone()
  }

  pub fn remove_file(&self, file_path: impl AsRef<Path>) {
    self.state.lock().files.remove(file_path.as_ref());
  }

  /// Sets the output for a command line such as `git diff --name-only main`.
  pub fn set_command_output(&self, command_line: &str, output: CommandOutput) {
    self.state.lock().command_outputs.insert(command_line.to_string(), output);
  }

  pub fn set_command_stdout(&self, command_line: &str, stdout: &str) {
    self.set_command_output(
      command_line,
      CommandOutput {
        success: true,
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
      },
    );
  }

  pub fn set_terminal_width(&self, width: Option<u16>) {
    self.state.lock().terminal_width = width;
  }

  pub fn set_verbose(&self, value: bool) {
    self.state.lock().is_verbose = value;
  }

  pub fn set_cwd(&self, cwd: impl AsRef<Path>) {
    self.state.lock().cwd = cwd.as_ref().to_path_buf();
  }

  pub fn take_logged_messages(&self) -> Vec<String> {
    std::mem::take(&mut self.state.lock().logged_messages)
  }

  pub fn take_logged_errors(&self) -> Vec<String> {
    std::mem::take(&mut self.state.lock().logged_errors)
  }

  /// Everything written to stderr, including the raw writes.
  pub fn take_stderr_text(&self) -> String {
    std::mem::take(&mut self.state.lock().stderr_text)
  }
}

impl Environment for TestEnvironment {
  fn read_file_bytes(&self, file_path: impl AsRef<Path>) -> Result<Vec<u8>> {
    match self.state.lock().files.get(file_path.as_ref()) {
      Some(bytes) => Ok(bytes.clone()),
      None => bail!("Could not find file at path {}", file_path.as_ref().display()),
    }
  }

  fn write_file_bytes(&self, file_path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
      self.mk_dir_all(parent);
    }
    self.state.lock().files.insert(file_path.as_ref().to_path_buf(), bytes.to_vec());
    Ok(())
  }

  fn path_exists(&self, file_path: impl AsRef<Path>) -> bool {
    let state = self.state.lock();
    state.files.contains_key(file_path.as_ref()) || state.directories.contains(file_path.as_ref())
  }

  fn canonicalize(&self, path: impl AsRef<Path>) -> Result<CanonicalizedPathBuf> {
    if !self.path_exists(&path) {
      bail!("Path did not exist: {}", path.as_ref().display());
    }
    Ok(CanonicalizedPathBuf::new(path.as_ref().to_path_buf()))
  }

  fn is_absolute_path(&self, path: impl AsRef<Path>) -> bool {
    path.as_ref().starts_with("/")
  }

  fn dir_info(&self, dir_path: impl AsRef<Path>) -> std::io::Result<Vec<DirEntry>> {
    let dir_path = dir_path.as_ref();
    let mut state = self.state.lock();
    state.read_dirs.push(dir_path.to_path_buf());
    if state.unreadable_dirs.contains(dir_path) {
      return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied."));
    }
    if !state.directories.contains(dir_path) {
      return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "Directory not found."));
    }
    let mut entries = Vec::new();
    for dir in state.directories.iter() {
      if dir.parent() == Some(dir_path) {
        entries.push(DirEntry::Directory(dir.clone()));
      }
    }
    for file in state.files.keys() {
      if file.parent() == Some(dir_path) {
        entries.push(DirEntry::File { path: file.clone() });
      }
    }
    // hash map order is random, so sort for stable tests
    entries.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(entries)
  }

  fn cwd(&self) -> Result<PathBuf> {
    Ok(self.state.lock().cwd.clone())
  }

  fn run_command(&self, cwd: &Path, program: &str, args: &[&str]) -> Result<CommandOutput> {
    let mut command_line = program.to_string();
    for arg in args {
      command_line.push(' ');
      command_line.push_str(arg);
    }
    match self.state.lock().command_outputs.get(&command_line) {
      Some(output) => Ok(output.clone()),
      None => bail!("Error running '{}' in {}: command not found", command_line, cwd.display()),
    }
  }

  fn log(&self, text: &str) {
    self.state.lock().logged_messages.push(text.to_string());
  }

  fn log_stderr(&self, text: &str) {
    let mut state = self.state.lock();
    state.logged_errors.push(text.to_string());
    state.stderr_text.push_str(text);
    state.stderr_text.push('\n');
  }

  fn write_stderr(&self, text: &str) {
    self.state.lock().stderr_text.push_str(text);
  }

  fn stderr_terminal_width(&self) -> Option<u16> {
    self.state.lock().terminal_width
  }

  fn is_verbose(&self) -> bool {
    self.state.lock().is_verbose
  }

  fn available_parallelism(&self) -> usize {
    4
  }
}
