//! Container configuration, read from YAML.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

fn default_max_resolution_depth() -> usize {
  128
}

fn default_allow_circular_references() -> bool {
  true
}

/// Tunables for a [`Container`](crate::Container).
///
/// ```yaml
/// max_resolution_depth: 64
/// allow_circular_references: false
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
  /// Upper bound on nested `get_bean` calls on a single thread.
  #[serde(default = "default_max_resolution_depth")]
  pub max_resolution_depth: usize,
  /// When `false`, a singleton cycle fails with `Error::CircularReference`
  /// instead of being broken with an early reference.
  #[serde(default = "default_allow_circular_references")]
  pub allow_circular_references: bool,
}

impl Default for ContainerConfig {
  fn default() -> Self {
    Self {
      max_resolution_depth: default_max_resolution_depth(),
      allow_circular_references: default_allow_circular_references(),
    }
  }
}

impl ContainerConfig {
  /// Parses a configuration document. An empty document yields the defaults.
  pub fn from_yaml_str(source: &str) -> Result<Self> {
    if source.trim().is_empty() {
      return Ok(Self::default());
    }
    let config: ContainerConfig =
      serde_yaml::from_str(source).map_err(|e| Error::ConfigParse(e.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  /// Reads and parses a YAML configuration file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let contents = fs::read_to_string(path.as_ref())?;
    Self::from_yaml_str(&contents)
  }

  fn validate(&self) -> Result<()> {
    if self.max_resolution_depth == 0 {
      return Err(Error::ConfigParse(
        "max_resolution_depth must be greater than zero".to_string(),
      ));
    }
    Ok(())
  }
}
