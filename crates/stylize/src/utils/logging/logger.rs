use parking_lot::Mutex;
use std::io::Stderr;
use std::io::Stdout;
use std::io::Write;
use std::io::stderr;
use std::io::stdout;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
  Info,
  Verbose,
}

#[derive(Clone)]
pub struct LoggerOptions {
  pub log_level: LogLevel,
}

/// Serializes all writes to stdout and stderr so that lines coming
/// from concurrently running tasks never interleave.
#[derive(Clone)]
pub struct Logger {
  output_lock: Arc<Mutex<LoggerState>>,
  is_verbose: bool,
}

struct LoggerState {
  std_out: Stdout,
  std_err: Stderr,
}

impl Logger {
  pub fn new(options: &LoggerOptions) -> Self {
    Logger {
      output_lock: Arc::new(Mutex::new(LoggerState {
        std_out: stdout(),
        std_err: stderr(),
      })),
      is_verbose: options.log_level == LogLevel::Verbose,
    }
  }

  #[inline]
  pub fn is_verbose(&self) -> bool {
    self.is_verbose
  }

  pub fn log(&self, text: &str) {
    let mut state = self.output_lock.lock();
    let text = with_trailing_newline(text);
    // ignore write failures (ex. closed pipe)
    let _ = state.std_out.write_all(text.as_bytes());
    let _ = state.std_out.flush();
  }

  pub fn log_stderr(&self, text: &str) {
    self.write_stderr(&with_trailing_newline(text));
  }

  pub fn write_stderr(&self, text: &str) {
    let mut state = self.output_lock.lock();
    let _ = state.std_err.write_all(text.as_bytes());
    let _ = state.std_err.flush();
  }
}

fn with_trailing_newline(text: &str) -> String {
  // only add a newline if the logged text does not end with one
  if text.ends_with('\n') {
    text.to_string()
  } else {
    format!("{}\n", text)
  }
}
