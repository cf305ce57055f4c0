use std::path::Path;

use crate::environment::Environment;
use crate::format::FormattingResultReceiver;

/// Counts collected while consuming the results.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
  /// Files that were formatted or need formatting.
  pub changed: usize,
  pub total: usize,
  pub errored: usize,
}

impl RunStats {
  fn record(&mut self, format_needed: bool, is_error: bool) {
    self.total += 1;
    if is_error {
      self.errored += 1;
    } else if format_needed {
      self.changed += 1;
    }
  }
}

/// Consumes the results, logging what happened to each file, and returns
/// the final counts.
///
/// When stderr is a terminal, unchanged files are shown on a line that the
/// next output overwrites.
pub async fn log_actions_and_collect_stats<TEnvironment: Environment>(
  mut results: FormattingResultReceiver,
  in_place: bool,
  environment: &TEnvironment,
) -> RunStats {
  let printer = LinePrinter {
    environment,
    terminal_width: environment.stderr_terminal_width(),
  };
  let mut stats = RunStats::default();

  while let Some(result) = results.recv().await {
    stats.record(result.format_needed, result.error.is_some());
    let file_path = display_path(&result.file_path);

    if let Some(err) = &result.error {
      let action = if in_place { "formatting" } else { "checking" };
      printer.print_line(&format!("Error {} file '{}': {:#}", action, file_path, err));
    } else if result.format_needed {
      let action = if in_place { "Formatted:" } else { "Needs formatting:" };
      printer.print_line(&format!("{} '{}'", action, file_path));
    } else if printer.is_terminal() {
      printer.print_transient(&format!("Checked '{}'", file_path));
    }
  }

  let summary = if in_place { "formatted" } else { "need formatting" };
  printer.print_line(&format!("{} / {} {}", stats.changed, stats.total, summary));
  stats
}

struct LinePrinter<'a, TEnvironment: Environment> {
  environment: &'a TEnvironment,
  terminal_width: Option<u16>,
}

impl<TEnvironment: Environment> LinePrinter<'_, TEnvironment> {
  fn is_terminal(&self) -> bool {
    self.terminal_width.is_some()
  }

  fn print_line(&self, text: &str) {
    self.environment.write_stderr(&format!("{}\n", self.pad(text)));
  }

  /// Prints a line that the next printed line overwrites.
  fn print_transient(&self, text: &str) {
    self.environment.write_stderr(&format!("{}\r", self.pad(text)));
  }

  // pad so a shorter line fully covers a previous transient one
  fn pad(&self, text: &str) -> String {
    let width = self.terminal_width.unwrap_or(0) as usize;
    format!("{:<width$}", text, width = width)
  }
}

fn display_path(file_path: &Path) -> String {
  file_path.to_string_lossy().replace('\\', "/")
}
