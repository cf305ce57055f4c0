use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::Formatter;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
  #[error("Both '{existing}' and '{new}' are registered to format '{key}' files.")]
  DuplicateKey { key: String, existing: String, new: String },
  #[error("Formatter '{0}' does not declare any file extensions.")]
  NoExtensions(String),
}

/// Maps file extensions, and whole file names for files without an
/// extension, to the formatter that handles them.
///
/// Built once before a run and only read afterwards.
#[derive(Default, Clone)]
pub struct FormatterRegistry {
  formatters_by_key: HashMap<String, Arc<dyn Formatter>>,
  names: Vec<String>,
}

impl FormatterRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&mut self, formatter: Arc<dyn Formatter>) -> Result<(), RegistryError> {
    let keys = formatter.file_extensions();
    if keys.is_empty() {
      return Err(RegistryError::NoExtensions(formatter.name().to_string()));
    }
    // check everything up front so a failed registration leaves nothing behind
    for key in &keys {
      if let Some(existing) = self.formatters_by_key.get(key) {
        return Err(RegistryError::DuplicateKey {
          key: key.clone(),
          existing: existing.name().to_string(),
          new: formatter.name().to_string(),
        });
      }
    }
    for key in keys {
      self.formatters_by_key.insert(key, formatter.clone());
    }
    self.names.push(formatter.name().to_string());
    Ok(())
  }

  pub fn get_for_file(&self, file_path: &Path) -> Option<&Arc<dyn Formatter>> {
    let key = get_lookup_key(file_path)?;
    self.formatters_by_key.get(&key)
  }

  pub fn is_empty(&self) -> bool {
    self.formatters_by_key.is_empty()
  }

  pub fn formatter_names(&self) -> &[String] {
    &self.names
  }
}

/// Gets the key used to find a formatter: the extension with its leading
/// dot, or the file name when the file has no extension.
pub fn get_lookup_key(file_path: &Path) -> Option<String> {
  match file_path.extension() {
    Some(ext) => Some(format!(".{}", ext.to_string_lossy())),
    None => file_path.file_name().map(|name| name.to_string_lossy().to_string()),
  }
}
