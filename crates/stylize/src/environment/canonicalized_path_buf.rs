use std::path::Display;
use std::path::Path;
use std::path::PathBuf;

/// A PathBuf that is guaranteed to be canonicalized.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalizedPathBuf {
  path: PathBuf,
}

impl CanonicalizedPathBuf {
  pub(super) fn new(path: PathBuf) -> Self {
    CanonicalizedPathBuf { path }
  }

  pub fn as_path(&self) -> &Path {
    &self.path
  }

  pub fn display(&self) -> Display<'_> {
    self.path.display()
  }

  pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
    self.path.join(path)
  }
}

impl AsRef<Path> for CanonicalizedPathBuf {
  fn as_ref(&self) -> &Path {
    self.path.as_path()
  }
}
