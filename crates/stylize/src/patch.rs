use anyhow::Context;
use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::format::FormattingResultReceiver;

pub type PatchSink = Box<dyn Write + Send>;

/// Where the patch is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutput {
  Stdout,
  File(PathBuf),
}

impl PatchOutput {
  /// Parses the command line value, where `-` is stdout.
  pub fn from_arg(value: &str) -> Self {
    if value == "-" { PatchOutput::Stdout } else { PatchOutput::File(PathBuf::from(value)) }
  }

  /// Opens the sink, creating or truncating the file.
  pub fn open(&self) -> std::io::Result<PatchSink> {
    match self {
      PatchOutput::Stdout => Ok(Box::new(std::io::stdout())),
      PatchOutput::File(file_path) => {
        let file = std::fs::File::create(file_path)?;
        Ok(Box::new(std::io::BufWriter::new(file)))
      }
    }
  }
}

/// Forwards every result to the returned receiver and, once the results
/// are exhausted, writes the patches of the changed files to the sink
/// ordered by file path.
///
/// The returned handle resolves after the patch was written.
pub fn collect_patch(mut results: FormattingResultReceiver, sink: PatchSink) -> (FormattingResultReceiver, JoinHandle<Result<()>>) {
  let (sender, receiver) = mpsc::channel(1);
  let handle = tokio::spawn(async move {
    let mut patches = Vec::new();
    while let Some(result) = results.recv().await {
      if result.error.is_none() && result.format_needed && !result.patch.is_empty() {
        patches.push((result.file_path.to_string_lossy().to_string(), result.patch.clone()));
      }
      // keep draining when the receiver is gone so the patch is still complete
      let _ = sender.send(result).await;
    }
    drop(sender);

    patches.sort_by(|a, b| a.0.cmp(&b.0));
    tokio::task::spawn_blocking(move || write_patches(sink, &patches)).await?
  });
  (receiver, handle)
}

fn write_patches(mut sink: PatchSink, patches: &[(String, String)]) -> Result<()> {
  for (file_path, patch) in patches {
    sink
      .write_all(patch.as_bytes())
      .and_then(|_| sink.write_all(b"\n"))
      .with_context(|| format!("Error writing patch for '{}'", file_path))?;
  }
  sink.flush().context("Error flushing patch output")?;
  Ok(())
}
