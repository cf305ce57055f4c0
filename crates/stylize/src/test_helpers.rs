use anyhow::Result;
use anyhow::bail;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::format::FormattingResult;
use crate::formatters::Formatter;

type FormatFn = dyn Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync;

/// Records how many formatting jobs overlap.
#[derive(Default)]
pub struct ConcurrencyTracker {
  current: AtomicUsize,
  max: AtomicUsize,
  started: AtomicUsize,
}

impl ConcurrencyTracker {
  fn start(&self) {
    self.started.fetch_add(1, Ordering::SeqCst);
    let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
    self.max.fetch_max(current, Ordering::SeqCst);
  }

  fn end(&self) {
    self.current.fetch_sub(1, Ordering::SeqCst);
  }

  pub fn max_concurrent(&self) -> usize {
    self.max.load(Ordering::SeqCst)
  }

  pub fn started(&self) -> usize {
    self.started.load(Ordering::SeqCst)
  }
}

/// Formatter that transforms text in memory instead of running a tool.
pub struct FakeFormatter {
  name: String,
  file_extensions: Vec<String>,
  format: Box<FormatFn>,
  delay: Option<Duration>,
  tracker: Option<Arc<ConcurrencyTracker>>,
}

impl FakeFormatter {
  pub fn new(name: &str, file_extensions: &[&str]) -> Self {
    Self {
      name: name.to_string(),
      file_extensions: file_extensions.iter().map(|e| e.to_string()).collect(),
      format: Box::new(|input| Ok(input.to_vec())),
      delay: None,
      tracker: None,
    }
  }

  /// Formats by trimming trailing whitespace from each line and fails on
  /// text containing `syntax error`.
  pub fn trimming(name: &str, file_extensions: &[&str]) -> Self {
    Self::new(name, file_extensions).with_format(|text| {
      if text.contains("syntax error") {
        bail!("Unexpected token.");
      }
      Ok(text.lines().map(|line| format!("{}\n", line.trim_end())).collect())
    })
  }

  pub fn with_format(self, format: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
    self.with_bytes_format(move |input| format(&String::from_utf8_lossy(input)).map(String::into_bytes))
  }

  pub fn with_bytes_format(mut self, format: impl Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync + 'static) -> Self {
    self.format = Box::new(format);
    self
  }

  /// Sleeps for the delay before formatting, stopping early with an
  /// error when the job is cancelled.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn with_tracker(mut self, tracker: Arc<ConcurrencyTracker>) -> Self {
    self.tracker = Some(tracker);
    self
  }

  fn run_format(&self, input: &[u8], token: &CancellationToken) -> Result<Vec<u8>> {
    if let Some(tracker) = &self.tracker {
      tracker.start();
    }
    let result = match self.wait_delay(token) {
      Ok(()) => (self.format)(input),
      Err(err) => Err(err),
    };
    if let Some(tracker) = &self.tracker {
      tracker.end();
    }
    result
  }

  fn wait_delay(&self, token: &CancellationToken) -> Result<()> {
    let Some(delay) = self.delay else {
      return Ok(());
    };
    let start = Instant::now();
    while start.elapsed() < delay {
      if token.is_cancelled() {
        bail!("Cancelled {}", self.name);
      }
      std::thread::sleep(Duration::from_millis(5).min(delay));
    }
    Ok(())
  }
}

impl Formatter for FakeFormatter {
  fn name(&self) -> &str {
    &self.name
  }

  fn file_extensions(&self) -> Vec<String> {
    self.file_extensions.clone()
  }

  fn is_installed(&self) -> bool {
    true
  }

  fn format_to_buffer(&self, _file_path: &Path, input: &[u8], token: &CancellationToken) -> Result<Vec<u8>> {
    self.run_format(input, token)
  }

  fn format_in_place(&self, file_path: &Path, token: &CancellationToken) -> Result<()> {
    let input = std::fs::read(file_path)?;
    let output = self.run_format(&input, token)?;
    if output != input {
      std::fs::write(file_path, output)?;
    }
    Ok(())
  }
}

pub fn result(file_path: &str, format_needed: bool, patch: &str) -> FormattingResult {
  FormattingResult {
    file_path: PathBuf::from(file_path),
    format_needed,
    patch: patch.to_string(),
    error: None,
  }
}

pub fn error_result(file_path: &str, message: &str) -> FormattingResult {
  FormattingResult {
    file_path: PathBuf::from(file_path),
    format_needed: false,
    patch: String::new(),
    error: Some(anyhow::anyhow!("{}", message)),
  }
}

/// Creates a closed channel that yields the provided results in order.
pub fn results_channel(results: Vec<FormattingResult>) -> mpsc::Receiver<FormattingResult> {
  let (sender, receiver) = mpsc::channel(results.len().max(1));
  for result in results {
    sender.try_send(result).unwrap();
  }
  receiver
}

pub async fn collect_results(mut receiver: mpsc::Receiver<FormattingResult>) -> Vec<FormattingResult> {
  let mut results = Vec::new();
  while let Some(result) = receiver.recv().await {
    results.push(result);
  }
  results
}

pub fn file_paths_channel(file_paths: &[&str]) -> mpsc::Receiver<PathBuf> {
  let (sender, receiver) = mpsc::channel(file_paths.len().max(1));
  for file_path in file_paths {
    sender.try_send(PathBuf::from(file_path)).unwrap();
  }
  receiver
}
