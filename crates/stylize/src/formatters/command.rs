use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use std::collections::HashMap;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::process::Child;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Output;
use std::process::Stdio;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::Formatter;

const FILE_PATH_PLACEHOLDER: &str = "{path}";
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Formatter that shells out to an external tool.
///
/// Buffer formatting pipes the file text through the tool's stdin and reads
/// the result from stdout. In place formatting passes the file path as the
/// last argument. Arguments may contain `{path}`, which is replaced with
/// the file path. The child process is killed when the job's token is
/// cancelled.
#[derive(Debug, Clone)]
pub struct CommandFormatter {
  name: String,
  command: String,
  file_extensions: Vec<String>,
  stdin_args: Vec<String>,
  in_place_args: Vec<String>,
  extra_args: Vec<String>,
  success_exit_codes: Vec<i32>,
}

impl CommandFormatter {
  pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      command: command.into(),
      file_extensions: Vec::new(),
      stdin_args: Vec::new(),
      in_place_args: Vec::new(),
      extra_args: Vec::new(),
      success_exit_codes: vec![0],
    }
  }

  pub fn with_file_extensions(mut self, values: &[&str]) -> Self {
    self.file_extensions = to_strings(values);
    self
  }

  /// Arguments for formatting stdin to stdout.
  pub fn with_stdin_args(mut self, values: &[&str]) -> Self {
    self.stdin_args = to_strings(values);
    self
  }

  /// Arguments for formatting a file in place. The file path is appended.
  pub fn with_in_place_args(mut self, values: &[&str]) -> Self {
    self.in_place_args = to_strings(values);
    self
  }

  /// User provided arguments passed in both modes.
  pub fn with_extra_args(mut self, values: Vec<String>) -> Self {
    self.extra_args = values;
    self
  }

  pub fn with_success_exit_codes(mut self, values: &[i32]) -> Self {
    self.success_exit_codes = values.to_vec();
    self
  }

  fn get_stdin_args(&self, file_path: &Path) -> Vec<String> {
    let args = self.stdin_args.iter().chain(self.extra_args.iter());
    args.map(|arg| replace_file_path(arg, file_path)).collect()
  }

  fn get_in_place_args(&self, file_path: &Path) -> Vec<String> {
    let args = self.in_place_args.iter().chain(self.extra_args.iter());
    let mut args = args.map(|arg| replace_file_path(arg, file_path)).collect::<Vec<_>>();
    args.push(file_path.to_string_lossy().to_string());
    args
  }

  fn ensure_success(&self, file_path: &Path, status: ExitStatus, stderr: &[u8]) -> Result<()> {
    let is_success = status.code().map(|code| self.success_exit_codes.contains(&code)).unwrap_or(false);
    if is_success {
      return Ok(());
    }
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    match status.code() {
      Some(code) if stderr.is_empty() => bail!("{} exited with code {} for {}", self.command, code, file_path.display()),
      Some(code) => bail!("{} exited with code {} for {}: {}", self.command, code, file_path.display(), stderr),
      None => bail!("{} was terminated by a signal while formatting {}", self.command, file_path.display()),
    }
  }

  /// Waits for the child to exit while draining its piped output.
  ///
  /// Kills the child and errors once the token is cancelled. The output
  /// readers are left behind in that case since a grandchild may still
  /// hold the pipes open.
  fn wait_with_output(&self, mut child: Child, file_path: &Path, token: &CancellationToken) -> Result<Output> {
    let stdout = child.stdout.take().map(read_to_end_on_thread);
    let stderr = child.stderr.take().map(read_to_end_on_thread);
    let status = loop {
      if let Some(status) = child.try_wait().with_context(|| format!("Error waiting for {}", self.command))? {
        break status;
      }
      if token.is_cancelled() {
        // ignore, the child may have exited in the meantime
        let _ = child.kill();
        let _ = child.wait();
        bail!("Killed {} formatting {}", self.command, file_path.display());
      }
      std::thread::sleep(CHILD_POLL_INTERVAL);
    };
    Ok(Output {
      status,
      stdout: join_output(stdout),
      stderr: join_output(stderr),
    })
  }
}

impl Formatter for CommandFormatter {
  fn name(&self) -> &str {
    &self.name
  }

  fn file_extensions(&self) -> Vec<String> {
    self.file_extensions.clone()
  }

  fn is_installed(&self) -> bool {
    which::which(&self.command).is_ok()
  }

  fn format_to_buffer(&self, file_path: &Path, input: &[u8], token: &CancellationToken) -> Result<Vec<u8>> {
    let mut child = Command::new(&self.command)
      .args(self.get_stdin_args(file_path))
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .with_context(|| format!("Error starting {}", self.command))?;

    // write on another thread so a tool that streams its output
    // while reading can't deadlock on a full stdout pipe
    let mut stdin = child.stdin.take().context("Error getting stdin of child process")?;
    let input = input.to_vec();
    let writer = std::thread::spawn(move || stdin.write_all(&input));

    let output = self.wait_with_output(child, file_path, token)?;
    let write_result = writer.join();
    self.ensure_success(file_path, output.status, &output.stderr)?;
    match write_result {
      Ok(Ok(())) => Ok(output.stdout),
      Ok(Err(err)) => Err(err).with_context(|| format!("Error writing {} to {}", file_path.display(), self.command)),
      Err(_) => bail!("Panicked writing {} to {}", file_path.display(), self.command),
    }
  }

  fn format_in_place(&self, file_path: &Path, token: &CancellationToken) -> Result<()> {
    let child = Command::new(&self.command)
      .args(self.get_in_place_args(file_path))
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .spawn()
      .with_context(|| format!("Error running {}", self.command))?;
    let output = self.wait_with_output(child, file_path, token)?;
    self.ensure_success(file_path, output.status, &output.stderr)
  }
}

fn read_to_end_on_thread(mut reader: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
  std::thread::spawn(move || {
    let mut buffer = Vec::new();
    // a read error leaves whatever was read so far
    let _ = reader.read_to_end(&mut buffer);
    buffer
  })
}

fn join_output(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
  handle.and_then(|handle| handle.join().ok()).unwrap_or_default()
}

/// Gets the formatters for the tools supported out of the box.
///
/// `formatter_args` maps formatter names to additional arguments.
pub fn get_builtin_formatters(formatter_args: &HashMap<String, Vec<String>>) -> Vec<CommandFormatter> {
  let extra_args = |name: &str| formatter_args.get(name).cloned().unwrap_or_default();
  vec![
    CommandFormatter::new("clang-format", resolve_clang_format_command())
      .with_file_extensions(&[".c", ".h", ".cpp", ".hpp", ".cc"])
      .with_stdin_args(&["-assume-filename={path}"])
      .with_in_place_args(&["-i"])
      .with_extra_args(extra_args("clang-format")),
    CommandFormatter::new("gofmt", "gofmt")
      .with_file_extensions(&[".go"])
      .with_in_place_args(&["-w"])
      .with_extra_args(extra_args("gofmt")),
    // yapf exits with 2 when it changed something
    CommandFormatter::new("yapf", "yapf")
      .with_file_extensions(&[".py"])
      .with_in_place_args(&["-i"])
      .with_extra_args(extra_args("yapf"))
      .with_success_exit_codes(&[0, 2]),
    CommandFormatter::new("buildifier", "buildifier")
      .with_file_extensions(&[".BUILD", "BUILD", "WORKSPACE", ".bzl"])
      .with_extra_args(extra_args("buildifier")),
  ]
}

/// Some distributions only ship versioned clang-format binaries
/// (ex. `clang-format-18`), so fall back to the newest one found.
fn resolve_clang_format_command() -> String {
  const NAME: &str = "clang-format";
  if which::which(NAME).is_ok() {
    return NAME.to_string();
  }
  (6..=30)
    .rev()
    .map(|version| format!("{}-{}", NAME, version))
    .find(|name| which::which(name).is_ok())
    .unwrap_or_else(|| NAME.to_string())
}

fn replace_file_path(arg: &str, file_path: &Path) -> String {
  arg.replace(FILE_PATH_PLACEHOLDER, &file_path.to_string_lossy())
}

fn to_strings(values: &[&str]) -> Vec<String> {
  values.iter().map(|v| v.to_string()).collect()
}
