//! Producers of the candidate file paths, relative to the root directory.
//!
//! Each source runs on its own task and hands paths over through a channel
//! with a single slot, so the walk only runs ahead of the dispatcher by one
//! path.

mod git;
mod walk;

pub use git::*;
pub use walk::*;

use std::path::PathBuf;
use tokio::sync::mpsc;

pub type FilePathReceiver = mpsc::Receiver<PathBuf>;

fn file_path_channel() -> (mpsc::Sender<PathBuf>, FilePathReceiver) {
  mpsc::channel(1)
}

#[cfg(test)]
async fn collect_file_paths(mut receiver: FilePathReceiver) -> Vec<PathBuf> {
  let mut file_paths = Vec::new();
  while let Some(file_path) = receiver.recv().await {
    file_paths.push(file_path);
  }
  file_paths
}
