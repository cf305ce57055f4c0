use anyhow::Result;
use anyhow::anyhow;
use futures::future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::environment::CanonicalizedPathBuf;
use crate::environment::Environment;
use crate::file_sources::FilePathReceiver;
use crate::formatters::Formatter;
use crate::formatters::FormatterRegistry;
use crate::utils::Semaphore;
use crate::utils::SemaphorePermit;
use crate::utils::get_unified_diff;

const SLOW_FORMAT_WARNING_DELAY: Duration = Duration::from_secs(10);

/// Outcome of formatting a single file.
#[derive(Debug)]
pub struct FormattingResult {
  /// Path relative to the root directory.
  pub file_path: PathBuf,
  pub format_needed: bool,
  /// Unified diff of the change. Only set in check mode.
  pub patch: String,
  pub error: Option<anyhow::Error>,
}

impl FormattingResult {
  fn from_outcome(file_path: PathBuf, outcome: Result<FormatOutcome>) -> Self {
    match outcome {
      Ok(outcome) => FormattingResult {
        file_path,
        format_needed: outcome.format_needed,
        patch: outcome.patch,
        error: None,
      },
      // an errored file only counts as errored, even if it was partially changed
      Err(err) => FormattingResult {
        file_path,
        format_needed: false,
        patch: String::new(),
        error: Some(err),
      },
    }
  }
}

pub type FormattingResultReceiver = mpsc::Receiver<FormattingResult>;

#[derive(Debug, Clone)]
pub struct DispatchOptions {
  pub root_dir: CanonicalizedPathBuf,
  pub in_place: bool,
  /// Maximum number of formatting jobs running at once.
  pub parallelism: usize,
  pub timeout: Option<Duration>,
}

struct FormatOutcome {
  format_needed: bool,
  patch: String,
}

/// Formats every received file that has a registered formatter and sends
/// one result per formatted file to the returned receiver.
///
/// Results are sent in completion order. The receiver is closed once the
/// file paths are exhausted and every started job has finished.
pub fn run_formatters_on_files<TEnvironment: Environment>(
  environment: &TEnvironment,
  registry: Arc<FormatterRegistry>,
  mut file_paths: FilePathReceiver,
  options: DispatchOptions,
) -> FormattingResultReceiver {
  let (sender, receiver) = mpsc::channel(1);
  let environment = environment.clone();
  tokio::spawn(async move {
    log_verbose!(environment, "Parallelism: {}", options.parallelism);
    let semaphore = Arc::new(Semaphore::new(options.parallelism));
    let mut format_handles = Vec::new();

    while let Some(file_path) = file_paths.recv().await {
      let Some(formatter) = registry.get_for_file(&file_path).cloned() else {
        log_verbose!(environment, "No formatter for {}", file_path.display());
        continue;
      };

      let permit = semaphore.acquire().await;
      let job = FormatJob {
        environment: environment.clone(),
        formatter,
        root_dir: options.root_dir.clone(),
        file_path,
        in_place: options.in_place,
      };
      let sender = sender.clone();
      let timeout = options.timeout;
      format_handles.push(tokio::spawn(async move {
        let result = job.run(permit, timeout).await;
        // ignore, the receiver was dropped
        let _ = sender.send(result).await;
      }));
    }

    future::join_all(format_handles).await;
  });
  receiver
}

struct FormatJob<TEnvironment: Environment> {
  environment: TEnvironment,
  formatter: Arc<dyn Formatter>,
  root_dir: CanonicalizedPathBuf,
  file_path: PathBuf,
  in_place: bool,
}

impl<TEnvironment: Environment> FormatJob<TEnvironment> {
  async fn run(self, permit: SemaphorePermit, timeout: Option<Duration>) -> FormattingResult {
    let file_path = self.file_path.clone();
    let long_format_token = CancellationToken::new();
    let _long_format_guard = long_format_token.clone().drop_guard();
    tokio::spawn({
      let environment = self.environment.clone();
      let file_path = file_path.clone();
      async move {
        tokio::select! {
          _ = long_format_token.cancelled() => {
            // exit
          }
          _ = tokio::time::sleep(SLOW_FORMAT_WARNING_DELAY) => {
            log_warn!(environment, "WARNING: Formatting is slow for {}", file_path.display());
          }
        }
      }
    });

    // cancelled on timeout so the formatter stops its work and the
    // permit is released when the blocking call returns
    let format_token = CancellationToken::new();
    let mut handle = tokio::task::spawn_blocking({
      let format_token = format_token.clone();
      move || {
        let _permit = permit;
        self.format(&format_token)
      }
    });
    let join_result = match timeout {
      Some(timeout) => match tokio::time::timeout(timeout, &mut handle).await {
        Ok(join_result) => join_result,
        Err(_) => {
          format_token.cancel();
          // ignore, the job already failed
          let _ = handle.await;
          let err = anyhow!("Timed out after {}s", timeout.as_secs_f64());
          return FormattingResult::from_outcome(file_path, Err(err));
        }
      },
      None => handle.await,
    };
    let outcome = join_result.unwrap_or_else(|err| Err(anyhow!("Formatting panicked: {}", err)));
    FormattingResult::from_outcome(file_path, outcome)
  }

  fn format(&self, token: &CancellationToken) -> Result<FormatOutcome> {
    let absolute_path = self.root_dir.join(&self.file_path);
    let original = self.environment.read_file_bytes(&absolute_path)?;
    if self.in_place {
      self.formatter.format_in_place(&absolute_path, token)?;
      let formatted = self.environment.read_file_bytes(&absolute_path)?;
      Ok(FormatOutcome {
        format_needed: formatted != original,
        patch: String::new(),
      })
    } else {
      let formatted = self.formatter.format_to_buffer(&absolute_path, &original, token)?;
      if formatted == original {
        return Ok(FormatOutcome {
          format_needed: false,
          patch: String::new(),
        });
      }
      let display_path = self.file_path.to_string_lossy().replace('\\', "/");
      let patch = get_unified_diff(&display_path, &String::from_utf8_lossy(&original), &String::from_utf8_lossy(&formatted));
      // bytes that differ only where the text isn't valid UTF-8 can't be
      // shown in a patch
      Ok(FormatOutcome {
        format_needed: !patch.is_empty(),
        patch,
      })
    }
  }
}
