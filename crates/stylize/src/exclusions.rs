use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// Version control metadata directories that are never formatted.
const VCS_DIR_NAMES: [&str; 2] = [".git", ".hg"];

/// Decides whether a path relative to the root directory is excluded.
///
/// Matching is done per path component, so the exclusion `foo` matches
/// `foo` and `foo/bar.go`, but not `foo2/bar.go`.
#[derive(Debug, Clone, Default)]
pub struct ExcludeMatcher {
  prefixes: Vec<PathBuf>,
}

impl ExcludeMatcher {
  pub fn new(prefixes: impl IntoIterator<Item = PathBuf>) -> Self {
    Self {
      prefixes: prefixes.into_iter().map(|p| normalize(&p)).filter(|p| !p.as_os_str().is_empty()).collect(),
    }
  }

  /// Returns true when `path` is located at or below one of the exclusions.
  pub fn is_excluded(&self, path: impl AsRef<Path>) -> bool {
    let path = normalize(path.as_ref());
    is_vcs_path(&path) || self.prefixes.iter().any(|prefix| path.starts_with(prefix))
  }
}

fn is_vcs_path(path: &Path) -> bool {
  path
    .components()
    .any(|c| matches!(c, Component::Normal(name) if name.to_str().is_some_and(|name| VCS_DIR_NAMES.contains(&name))))
}

// drops `./` segments so `./vendor` and `vendor` are equivalent
fn normalize(path: &Path) -> PathBuf {
  path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}
