use std::path::Path;
use std::path::PathBuf;
use tokio::sync::mpsc;

use super::FilePathReceiver;
use super::file_path_channel;
use crate::environment::CanonicalizedPathBuf;
use crate::environment::DirEntry;
use crate::environment::Environment;
use crate::exclusions::ExcludeMatcher;

/// Walks the root directory and sends every non-excluded file,
/// relative to the root directory, to the returned receiver.
///
/// Excluded directories are pruned and never read. Entries that can't be
/// read are skipped and the walk carries on with the rest of the tree.
pub fn iterate_all_files<TEnvironment: Environment>(
  environment: &TEnvironment,
  root_dir: &CanonicalizedPathBuf,
  exclude_matcher: ExcludeMatcher,
) -> FilePathReceiver {
  let (sender, receiver) = file_path_channel();
  let walker = TreeWalker {
    environment: environment.clone(),
    root_dir: root_dir.clone(),
    exclude_matcher,
    sender,
  };
  tokio::task::spawn_blocking(move || walker.run());
  receiver
}

struct TreeWalker<TEnvironment: Environment> {
  environment: TEnvironment,
  root_dir: CanonicalizedPathBuf,
  exclude_matcher: ExcludeMatcher,
  sender: mpsc::Sender<PathBuf>,
}

impl<TEnvironment: Environment> TreeWalker<TEnvironment> {
  pub fn run(&self) {
    let mut pending_dirs = vec![self.root_dir.as_path().to_path_buf()];
    while let Some(dir_path) = pending_dirs.pop() {
      let mut entries = match self.environment.dir_info(&dir_path) {
        Ok(entries) => entries,
        Err(err) => {
          self.skip_unreadable_dir(&dir_path, err);
          continue;
        }
      };
      entries.sort_by(|a, b| a.path().cmp(b.path()));

      let mut child_dirs = Vec::new();
      for entry in entries {
        let Some(relative_path) = self.relative_path(entry.path()) else {
          continue;
        };
        if self.exclude_matcher.is_excluded(&relative_path) {
          log_verbose!(self.environment, "Excluded: {}", relative_path.display());
          continue;
        }
        match entry {
          DirEntry::Directory(path) => child_dirs.push(path),
          DirEntry::File { .. } => {
            if self.sender.blocking_send(relative_path).is_err() {
              return; // receiver dropped, so stop walking
            }
          }
        }
      }
      // reversed so the directories are visited in sorted order
      pending_dirs.extend(child_dirs.into_iter().rev());
    }
  }

  /// Policy for directories that can't be read: skip them and keep walking.
  /// They were never candidates, so they aren't counted as errors.
  fn skip_unreadable_dir(&self, dir_path: &Path, err: std::io::Error) {
    log_verbose!(self.environment, "Skipping unreadable directory {}: {:#}", dir_path.display(), err);
  }

  fn relative_path(&self, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(self.root_dir.as_path()).ok().map(|p| p.to_path_buf())
  }
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;
  use std::path::PathBuf;

  use super::*;
  use crate::environment::TestEnvironment;
  use crate::file_sources::collect_file_paths;

  fn paths(values: &[&str]) -> Vec<PathBuf> {
    values.iter().map(PathBuf::from).collect()
  }

  #[tokio::test]
  async fn yields_all_files_relative_to_root() {
    let environment = TestEnvironment::new();
    environment.write_file("/project/a.go", "");
    environment.write_file("/project/src/b.c", "");
    environment.write_file("/project/src/nested/c.py", "");
    environment.write_file("/other/d.go", "");
    let root_dir = environment.canonicalize("/project").unwrap();

    let receiver = iterate_all_files(&environment, &root_dir, ExcludeMatcher::default());
    let file_paths = collect_file_paths(receiver).await;

    assert_eq!(file_paths, paths(&["a.go", "src/b.c", "src/nested/c.py"]));
  }

  #[tokio::test]
  async fn never_descends_into_excluded_dirs() {
    let environment = TestEnvironment::new();
    environment.write_file("/project/main.go", "");
    environment.write_file("/project/vendor/a/b/c/d/e/deep.go", "");
    environment.write_file("/project/vendor2/kept.go", "");
    environment.write_file("/project/.git/objects/pack/data.go", "");
    let root_dir = environment.canonicalize("/project").unwrap();

    let receiver = iterate_all_files(&environment, &root_dir, ExcludeMatcher::new(paths(&["vendor"])));
    let file_paths = collect_file_paths(receiver).await;

    assert_eq!(file_paths, paths(&["main.go", "vendor2/kept.go"]));
    let read_dirs = environment.read_dirs();
    assert_eq!(read_dirs, paths(&["/project", "/project/vendor2"]));
  }

  #[tokio::test]
  async fn excludes_files_by_prefix() {
    let environment = TestEnvironment::new();
    environment.write_file("/project/generated.go", "");
    environment.write_file("/project/src/gen/a.go", "");
    environment.write_file("/project/src/b.go", "");
    let root_dir = environment.canonicalize("/project").unwrap();

    let receiver = iterate_all_files(&environment, &root_dir, ExcludeMatcher::new(paths(&["generated.go", "src/gen"])));
    let file_paths = collect_file_paths(receiver).await;

    assert_eq!(file_paths, paths(&["src/b.go"]));
  }

  #[tokio::test]
  async fn skips_unreadable_dirs_and_continues() {
    let environment = TestEnvironment::new();
    environment.write_file("/project/a/1.go", "");
    environment.set_dir_unreadable("/project/b");
    environment.write_file("/project/c/2.go", "");
    let root_dir = environment.canonicalize("/project").unwrap();

    let receiver = iterate_all_files(&environment, &root_dir, ExcludeMatcher::default());
    let file_paths = collect_file_paths(receiver).await;

    assert_eq!(file_paths, paths(&["a/1.go", "c/2.go"]));
    assert_eq!(environment.take_logged_errors(), Vec::<String>::new());
  }

  #[tokio::test]
  async fn stops_when_receiver_dropped() {
    let environment = TestEnvironment::new();
    for i in 0..20 {
      environment.write_file(format!("/project/dir{:02}/a.go", i), "");
    }
    let root_dir = environment.canonicalize("/project").unwrap();

    let mut receiver = iterate_all_files(&environment, &root_dir, ExcludeMatcher::default());
    assert_eq!(receiver.recv().await, Some(PathBuf::from("dir00/a.go")));
    drop(receiver);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // the root and dir00, then at most dir01 buffered in the channel and
    // dir02 blocked on sending
    let read_dirs = environment.read_dirs();
    assert!(read_dirs.len() <= 4, "read {} directories", read_dirs.len());
  }
}
