//! Host configuration (`mupy.yaml`).
//!
//! The configuration file is found by searching upward from a working
//! directory. Its directory anchors the stock and build trees.

pub mod host;
mod shell;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::target::Mode;

pub use host::Host;
pub use shell::ShellConfig;

/// Name of the null target used when no target is configured.
pub const NULL_TARGET: &str = "_null_";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("{filename} not found in or above {}", directory.display())]
  Missing { filename: String, directory: PathBuf },

  #[error("cannot read configuration {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("invalid YAML in {}: {source}", path.display())]
  Syntax { path: PathBuf, source: serde_yaml::Error },

  #[error("malformed configuration {}: {source}", path.display())]
  Structure { path: PathBuf, source: serde_yaml::Error },

  #[error("missing configuration for target '{name}'")]
  MissingTarget { name: String },

  #[error("missing configuration for mode '{name}'")]
  MissingMode { name: String },

  #[error("unknown type '{kind}' for mode '{name}'")]
  UnknownModeType { name: String, kind: String },

  #[error("shell is not a file: '{}'", path.display())]
  ShellNotFile { path: PathBuf },

  #[error("shell is not executable: '{}'", path.display())]
  ShellNotExecutable { path: PathBuf },

  #[error("working directory does not exist: '{}'", path.display())]
  MissingWorkingDirectory { path: PathBuf },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
  pub stock: Option<PathBuf>,
  pub build: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DefaultConfig {
  pub target: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShellSection {
  pub bin: Option<PathBuf>,
  pub env: BTreeMap<String, String>,
}

/// One entry of `targets`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
  pub name: Option<String>,
  pub mode: Option<String>,
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub precompile: Option<bool>,
  pub tags: Option<String>,
  pub meta: BTreeMap<String, Value>,
}

impl TargetConfig {
  /// The local target used when nothing is configured.
  pub fn null() -> Self {
    Self {
      name: Some(NULL_TARGET.to_string()),
      mode: Some("local".to_string()),
      kind: Some("none".to_string()),
      precompile: Some(false),
      ..Self::default()
    }
  }

  pub fn meta_str(&self, key: &str) -> Option<String> {
    match self.meta.get(key)? {
      Value::String(s) => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    }
  }

  pub fn meta_u64(&self, key: &str) -> Option<u64> {
    match self.meta.get(key)? {
      Value::Number(n) => n.as_u64(),
      Value::String(s) => s.parse().ok(),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModeMeta {
  pub dockerfile: Option<String>,
  pub message: Option<String>,
}

/// One entry of `mode`, keyed by target type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub meta: ModeMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
  pub directory: DirectoryConfig,
  pub default: DefaultConfig,
  pub shell: Option<ShellSection>,
  pub targets: Vec<TargetConfig>,
  pub mode: BTreeMap<String, ModeConfig>,
  pub version: Option<Value>,
}

/// A loaded configuration file.
#[derive(Debug, Clone)]
pub struct Configuration {
  path: PathBuf,
  file: ConfigFile,
}

impl Configuration {
  /// Load the first `filename` found in `directory` or one of its parents.
  pub fn from_search(directory: &Path, filename: &str) -> Result<Self, ConfigError> {
    let start = std::path::absolute(directory).map_err(|source| ConfigError::Read {
      path: directory.to_path_buf(),
      source,
    })?;
    let path = start
      .ancestors()
      .map(|dir| dir.join(filename))
      .find(|path| path.is_file())
      .ok_or_else(|| ConfigError::Missing {
        filename: filename.to_string(),
        directory: start.clone(),
      })?;
    Self::from_path(&path)
  }

  pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let config = Self::from_content(path, &content)?;
    info!(path = ?path, targets = config.file.targets.len(), "configuration loaded");
    Ok(config)
  }

  /// Parse configuration content as if read from `path`.
  pub fn from_content(path: &Path, content: &str) -> Result<Self, ConfigError> {
    let value: Value = serde_yaml::from_str(content).map_err(|source| ConfigError::Syntax {
      path: path.to_path_buf(),
      source,
    })?;
    let file = if value.is_null() {
      ConfigFile::default()
    } else {
      serde_yaml::from_value(value).map_err(|source| ConfigError::Structure {
        path: path.to_path_buf(),
        source,
      })?
    };
    Ok(Self {
      path: path.to_path_buf(),
      file,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// The directory holding the configuration file.
  pub fn directory(&self) -> &Path {
    self.path.parent().unwrap_or(Path::new("."))
  }

  pub fn file(&self) -> &ConfigFile {
    &self.file
  }

  pub fn targets(&self) -> &[TargetConfig] {
    &self.file.targets
  }

  /// Pick a target: the explicit name, else `default.target`, else the first
  /// declared target, else the null local target.
  pub fn target(&self, name: Option<&str>) -> Result<TargetConfig, ConfigError> {
    let wanted = name.or(self.file.default.target.as_deref());
    let Some(wanted) = wanted else {
      let config = self.file.targets.first().cloned().unwrap_or_else(TargetConfig::null);
      debug!(target = ?config.name, "using fallback target");
      return Ok(config);
    };
    if wanted == NULL_TARGET {
      return Ok(TargetConfig::null());
    }
    self
      .file
      .targets
      .iter()
      .find(|t| t.name.as_deref() == Some(wanted))
      .cloned()
      .ok_or_else(|| ConfigError::MissingTarget {
        name: wanted.to_string(),
      })
  }

  /// The image mode for target type `name`.
  pub fn mode(&self, name: &str) -> Result<Mode, ConfigError> {
    let config = self.file.mode.get(name).ok_or_else(|| ConfigError::MissingMode {
      name: name.to_string(),
    })?;
    match config.kind.as_deref() {
      Some("docker") => {
        let dockerfile = config.meta.dockerfile.clone().ok_or_else(|| ConfigError::MissingMode {
          name: format!("{name}.meta.dockerfile"),
        })?;
        Ok(Mode::docker(name, dockerfile, config.meta.message.clone()))
      }
      other => Err(ConfigError::UnknownModeType {
        name: name.to_string(),
        kind: other.unwrap_or("").to_string(),
      }),
    }
  }

  /// Names of every configured mode.
  pub fn mode_names(&self) -> impl Iterator<Item = &str> {
    self.file.mode.keys().map(String::as_str)
  }

  /// Shell settings for kit hooks, run from the configuration directory.
  pub fn shell(&self) -> Result<ShellConfig, ConfigError> {
    ShellConfig::from_section(self.file.shell.as_ref(), self.directory())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  const SAMPLE: &str = r#"
directory:
  stock: "catalog"
default:
  target: python
targets:
  - name: ghost
    mode: local
    type: cpython
    tags: +host
  - name: python
    mode: docker
    type: cpython
  - name: stm32
    mode: cross
    meta:
      baud: 115200
      port: "/dev/ttyACM0"
mode:
  cpython:
    type: docker
    meta:
      dockerfile: |
        FROM python:3
  odd:
    type: podman
    meta:
      dockerfile: "FROM x"
"#;

  fn sample() -> Configuration {
    Configuration::from_content(Path::new("/proj/mupy.yaml"), SAMPLE).unwrap()
  }

  #[test]
  fn search_walks_upward() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("mupy.yaml"), SAMPLE).unwrap();
    let nested = temp.path().join("a/b/c");
    std::fs::create_dir_all(&nested).unwrap();

    let config = Configuration::from_search(&nested, "mupy.yaml").unwrap();
    assert_eq!(config.path(), temp.path().join("mupy.yaml"));
    assert_eq!(config.directory(), temp.path());
  }

  #[test]
  fn search_ignores_directories_named_like_the_file() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("inner/mupy.yaml")).unwrap();
    std::fs::write(temp.path().join("mupy.yaml"), "").unwrap();

    let config = Configuration::from_search(&temp.path().join("inner"), "mupy.yaml").unwrap();
    assert_eq!(config.path(), temp.path().join("mupy.yaml"));
  }

  #[test]
  fn missing_file_is_reported() {
    let temp = TempDir::new().unwrap();
    let err = Configuration::from_search(temp.path(), "does-not-exist.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Missing { .. }));
  }

  #[test]
  fn syntax_and_structure_errors_differ() {
    let path = Path::new("/x/mupy.yaml");
    assert!(matches!(
      Configuration::from_content(path, "targets: [ {"),
      Err(ConfigError::Syntax { .. })
    ));
    assert!(matches!(
      Configuration::from_content(path, "targets: 3"),
      Err(ConfigError::Structure { .. })
    ));
  }

  #[test]
  fn target_selection_order() {
    let config = sample();
    assert_eq!(config.target(Some("stm32")).unwrap().name.as_deref(), Some("stm32"));
    assert_eq!(config.target(None).unwrap().name.as_deref(), Some("python"));

    let no_default = Configuration::from_content(Path::new("/p/mupy.yaml"), "targets:\n  - name: a\n  - name: b\n").unwrap();
    assert_eq!(no_default.target(None).unwrap().name.as_deref(), Some("a"));

    let empty = Configuration::from_content(Path::new("/p/mupy.yaml"), "").unwrap();
    assert_eq!(empty.target(None).unwrap().name.as_deref(), Some(NULL_TARGET));
  }

  #[test]
  fn unknown_target_fails() {
    let err = sample().target(Some("esp32")).unwrap_err();
    assert_eq!(err.to_string(), "missing configuration for target 'esp32'");
  }

  #[test]
  fn target_meta_values() {
    let stm32 = sample().target(Some("stm32")).unwrap();
    assert_eq!(stm32.meta_u64("baud"), Some(115200));
    assert_eq!(stm32.meta_str("port").as_deref(), Some("/dev/ttyACM0"));
    assert_eq!(stm32.meta_str("missing"), None);
  }

  #[test]
  fn mode_lookup() {
    let config = sample();
    let mode = config.mode("cpython").unwrap();
    assert_eq!(mode.tag(), "mupy:cpython");
    assert!(matches!(config.mode("micropython"), Err(ConfigError::MissingMode { .. })));
    assert!(matches!(config.mode("odd"), Err(ConfigError::UnknownModeType { .. })));
  }
}
