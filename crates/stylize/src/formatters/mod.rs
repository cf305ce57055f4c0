mod command;
mod registry;

pub use command::*;
pub use registry::*;

use anyhow::Result;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Capability implemented by every formatting tool.
///
/// The pipeline only talks to formatters through this trait and has no
/// knowledge of the tool behind it. Formatting calls receive a token that
/// is cancelled when the job times out, after which the call should stop
/// its work and return an error.
pub trait Formatter: Send + Sync {
  /// Name used in logs and to look up user provided arguments.
  fn name(&self) -> &str;
  /// Extensions (ex. `.go`) or whole file names (ex. `BUILD`) handled
  /// by this formatter.
  fn file_extensions(&self) -> Vec<String>;
  fn is_installed(&self) -> bool;
  /// Formats the provided file text and returns the formatted text.
  ///
  /// The file path is informational and the file is not read.
  fn format_to_buffer(&self, file_path: &Path, input: &[u8], token: &CancellationToken) -> Result<Vec<u8>>;
  /// Formats the file on disk, overwriting it.
  fn format_in_place(&self, file_path: &Path, token: &CancellationToken) -> Result<()>;
}
