use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;

pub const DEFAULT_CONFIG_FILE_NAME: &str = ".stylize.json";

/// Contents of a `.stylize.json` file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
  /// Paths relative to the root directory that are skipped.
  #[serde(default)]
  pub excludes: Vec<String>,
  #[serde(default)]
  pub parallelism: Option<usize>,
  /// Additional arguments keyed by formatter name.
  #[serde(default)]
  pub formatter_args: HashMap<String, Vec<String>>,
}

pub fn deserialize_config_file(text: &str) -> Result<ConfigFile> {
  Ok(serde_json::from_str(text)?)
}
