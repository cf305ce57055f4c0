use anyhow::Result;
use anyhow::bail;
use std::path::PathBuf;

use super::FilePathReceiver;
use super::file_path_channel;
use crate::environment::CanonicalizedPathBuf;
use crate::environment::Environment;
use crate::exclusions::ExcludeMatcher;

/// Sends the files that changed since `diffbase`, relative to the root
/// directory, to the returned receiver.
///
/// Both git queries run before anything is sent, so a failing query is
/// returned as an error instead of producing a partial set of files.
pub fn iterate_changed_files<TEnvironment: Environment>(
  environment: &TEnvironment,
  root_dir: &CanonicalizedPathBuf,
  exclude_matcher: ExcludeMatcher,
  diffbase: &str,
) -> Result<FilePathReceiver> {
  let changed_files = get_git_changed_files(environment, root_dir, diffbase)?;
  let git_root = get_git_root(environment, root_dir)?;
  log_verbose!(environment, "Git root: {}", git_root.display());

  let (sender, receiver) = file_path_channel();
  let environment = environment.clone();
  let root_dir = root_dir.clone();
  tokio::task::spawn_blocking(move || {
    for changed_file in changed_files {
      let absolute_path = git_root.join(&changed_file);
      let relative_path = match absolute_path.strip_prefix(root_dir.as_path()) {
        Ok(path) => path.to_path_buf(),
        Err(_) => {
          log_verbose!(environment, "Outside root directory: {}", absolute_path.display());
          continue;
        }
      };

      if exclude_matcher.is_excluded(&relative_path) {
        continue;
      }

      // git reports deleted files as changed, but there's nothing to format
      if !environment.path_exists(&absolute_path) {
        log_verbose!(environment, "Skipping deleted file: {}", absolute_path.display());
        continue;
      }

      if sender.blocking_send(relative_path).is_err() {
        return; // receiver dropped
      }
    }
  });

  Ok(receiver)
}

/// Lists the files that differ between the working tree and `diffbase`,
/// relative to the repository root.
///
/// Uses `-z` so that paths with special characters aren't quoted.
fn get_git_changed_files(environment: &impl Environment, root_dir: &CanonicalizedPathBuf, diffbase: &str) -> Result<Vec<String>> {
  let output = environment.run_command(root_dir.as_path(), "git", &["diff", "--name-only", "-z", diffbase])?;
  if !output.success {
    bail!("Error getting files changed since '{}' from git: {}", diffbase, output.stderr_text());
  }
  Ok(
    output
      .stdout_text()
      .split('\0')
      .map(|line| line.trim_end_matches('\n'))
      .filter(|line| !line.is_empty())
      .map(ToOwned::to_owned)
      .collect(),
  )
}

/// Resolves the top level directory of the repository containing `root_dir`.
fn get_git_root(environment: &impl Environment, root_dir: &CanonicalizedPathBuf) -> Result<PathBuf> {
  let output = environment.run_command(root_dir.as_path(), "git", &["rev-parse", "--show-toplevel"])?;
  if !output.success {
    bail!("Error resolving the git repository root: {}", output.stderr_text());
  }
  let git_root = output.stdout_text();
  let git_root = git_root.trim();
  if git_root.is_empty() {
    bail!("Error resolving the git repository root: git returned an empty path");
  }
  Ok(environment.canonicalize(git_root)?.as_path().to_path_buf())
}
