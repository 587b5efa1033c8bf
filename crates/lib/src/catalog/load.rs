//! Ensemble descriptor loading.
//!
//! Descriptors are parsed in two steps so that malformed YAML
//! ([`CatalogError::Syntax`]) stays distinct from well-formed YAML of the
//! wrong shape ([`CatalogError::Structure`]) and from semantic errors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::syntax::{SyntaxError, identifier};
use crate::tag::{TagIndex, TagRay};

use super::CatalogError;
use super::types::{Ensemble, Import, Part, ShellSpec, Shlet};

const SHLET: &str = "shlet";
const SHELL: &str = "shell";
const QUIET_SHELL: &str = "shhell";
const PATH: &str = "path";

#[derive(Debug, Default, Deserialize)]
struct Descriptor {
  #[serde(default)]
  version: Option<Value>,
  #[serde(default)]
  path: Option<String>,
  #[serde(default)]
  exports: Option<Vec<String>>,
  #[serde(default)]
  parts: Option<Vec<Mapping>>,
  #[serde(default)]
  imports: Option<Vec<ImportDescriptor>>,
}

#[derive(Debug, Deserialize)]
struct ImportDescriptor {
  #[serde(default)]
  name: Option<String>,
  #[serde(default)]
  version: Option<Value>,
  #[serde(default)]
  parts: Option<Vec<AliasDescriptor>>,
}

#[derive(Debug, Deserialize)]
struct AliasDescriptor {
  #[serde(default)]
  name: Option<String>,
  #[serde(default, rename = "as")]
  alias: Option<String>,
}

/// Load the ensemble described by `descriptor`, found under grade level `grade`.
///
/// The ensemble is named after the descriptor's file stem, and its base
/// directory is the descriptor's directory joined with the optional `path`.
pub fn load_ensemble(grade: &str, descriptor: &Path) -> Result<Ensemble, CatalogError> {
  if descriptor.is_dir() {
    return Err(CatalogError::IsDirectory {
      path: descriptor.to_path_buf(),
    });
  }
  let content = std::fs::read_to_string(descriptor).map_err(|source| CatalogError::Read {
    path: descriptor.to_path_buf(),
    source,
  })?;
  let value: Value = serde_yaml::from_str(&content).map_err(|source| CatalogError::Syntax {
    path: descriptor.to_path_buf(),
    source,
  })?;
  let parsed: Descriptor = if value.is_null() {
    Descriptor::default()
  } else {
    serde_yaml::from_value(value).map_err(|source| CatalogError::Structure {
      path: descriptor.to_path_buf(),
      source,
    })?
  };

  let location = descriptor.display().to_string();
  let rpath = PathBuf::from(parsed.path.unwrap_or_default());
  if rpath.is_absolute() {
    return Err(CatalogError::AbsolutePath { path: rpath, location });
  }

  let exports_at = format!("{location} exports");
  let mut exports: Vec<String> = Vec::new();
  for export in parsed.exports.unwrap_or_default() {
    let name = identifier(&export, Some(&exports_at))?;
    if exports.contains(&name) {
      return Err(CatalogError::DuplicateExport {
        name,
        path: descriptor.to_path_buf(),
      });
    }
    exports.push(name);
  }

  let parts_at = format!("{location} parts");
  let parts = parsed
    .parts
    .unwrap_or_default()
    .iter()
    .map(|p| load_part(p, &parts_at).map(Arc::new))
    .collect::<Result<Vec<_>, _>>()?;

  let imports_at = format!("{location} imports");
  let imports = parsed
    .imports
    .unwrap_or_default()
    .into_iter()
    .map(|i| load_import(i, &imports_at))
    .collect::<Result<Vec<_>, _>>()?;

  let name = descriptor
    .file_stem()
    .map(|s| s.to_string_lossy().to_string())
    .unwrap_or_default();
  let parent = descriptor.parent().unwrap_or(Path::new("."));
  let base = if rpath.as_os_str().is_empty() {
    parent.to_path_buf()
  } else {
    parent.join(rpath)
  };

  debug!(ensemble = %name, grade, parts = parts.len(), "loaded ensemble");

  Ok(Ensemble {
    grade: grade.to_string(),
    path: base,
    name,
    parts,
    exports,
    imports,
    version: parsed.version.as_ref().and_then(scalar),
  })
}

fn load_part(mapping: &Mapping, location: &str) -> Result<Part, CatalogError> {
  let name = match mapping.get("name") {
    None | Some(Value::Null) => {
      return Err(CatalogError::MissingPartName {
        location: location.to_string(),
      });
    }
    Some(value) => identifier(&scalar(value).unwrap_or_else(|| format!("{value:?}")), Some(location))?,
  };

  let mut shlets = TagIndex::new();
  let mut shells = TagIndex::new();
  let mut tagged_paths = Vec::new();
  let mut base_path = None;

  for (key, value) in mapping {
    let Some(key) = key.as_str() else {
      return Err(SyntaxError::Identifier {
        value: format!("{key:?}"),
        location: Some(location.to_string()),
      }
      .into());
    };
    if key == "name" || key == "uses" {
      continue;
    }
    if let Some(tags) = key.strip_prefix(SHLET) {
      shlets
        .add(parse_tags(tags, location)?, load_shlet(value, location)?)
        .map_err(|source| tag_error(location, source))?;
    } else if let Some(tags) = key.strip_prefix(QUIET_SHELL) {
      let spec = ShellSpec {
        commands: load_commands(value, location)?,
        quiet: true,
      };
      shells
        .add(parse_tags(tags, location)?, spec)
        .map_err(|source| tag_error(location, source))?;
    } else if let Some(tags) = key.strip_prefix(SHELL) {
      let spec = ShellSpec {
        commands: load_commands(value, location)?,
        quiet: false,
      };
      shells
        .add(parse_tags(tags, location)?, spec)
        .map_err(|source| tag_error(location, source))?;
    } else if let Some(tags) = key.strip_prefix(PATH) {
      let path = relative_path(key, value, location)?;
      if tags.is_empty() {
        base_path = Some(path.clone());
      }
      tagged_paths.push((parse_tags(tags, location)?, path));
    } else {
      warn!(key, location, part = %name, "ignoring unknown part key");
    }
  }

  if base_path.is_none() && shells.is_empty() {
    return Err(CatalogError::MissingPathOrShell {
      part: name,
      location: location.to_string(),
    });
  }

  let mut paths = TagIndex::new();
  for (tags, path) in tagged_paths {
    paths.add(tags, path).map_err(|source| tag_error(location, source))?;
  }

  let uses = match mapping.get("uses") {
    None | Some(Value::Null) => Vec::new(),
    Some(Value::Sequence(items)) => items
      .iter()
      .map(|item| identifier(&scalar(item).unwrap_or_else(|| format!("{item:?}")), Some(location)))
      .collect::<Result<Vec<_>, _>>()?,
    Some(_) => {
      return Err(CatalogError::InvalidValue {
        key: "uses".to_string(),
        location: location.to_string(),
      });
    }
  };

  Ok(Part {
    name,
    path: base_path,
    paths,
    shlets,
    shells,
    uses,
  })
}

fn load_import(import: ImportDescriptor, location: &str) -> Result<Import, CatalogError> {
  let name = match import.name {
    Some(name) if !name.is_empty() => name,
    _ => {
      return Err(CatalogError::MissingImportName {
        location: location.to_string(),
      });
    }
  };
  let parts_at = format!("{location} parts");
  let mut aliases = BTreeMap::new();
  for part in import.parts.unwrap_or_default() {
    let Some(exported) = part.name else {
      return Err(CatalogError::MissingImportName { location: parts_at });
    };
    let exported = identifier(&exported, Some(&parts_at))?;
    let alias = identifier(part.alias.as_deref().unwrap_or(&exported), Some(&parts_at))?;
    if aliases.contains_key(&alias) {
      return Err(CatalogError::DuplicateAlias {
        alias,
        location: parts_at,
      });
    }
    aliases.insert(alias, exported);
  }
  Ok(Import {
    name,
    aliases,
    version: import.version.as_ref().and_then(scalar),
  })
}

fn load_shlet(value: &Value, location: &str) -> Result<Shlet, CatalogError> {
  let invalid = || CatalogError::InvalidShlet {
    location: location.to_string(),
  };
  let mapping = value.as_mapping().ok_or_else(invalid)?;
  let mut shlet = Shlet::new();
  for (key, value) in mapping {
    let key = key.as_str().ok_or_else(invalid)?;
    shlet.insert(identifier(key, Some(location))?, scalar(value).ok_or_else(invalid)?);
  }
  Ok(shlet)
}

fn load_commands(value: &Value, location: &str) -> Result<Vec<String>, CatalogError> {
  let invalid = || CatalogError::InvalidShell {
    location: location.to_string(),
  };
  match value {
    Value::String(command) => Ok(vec![command.clone()]),
    Value::Sequence(items) => items
      .iter()
      .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
      .collect(),
    _ => Err(invalid()),
  }
}

fn relative_path(key: &str, value: &Value, location: &str) -> Result<PathBuf, CatalogError> {
  let path = value
    .as_str()
    .map(PathBuf::from)
    .ok_or_else(|| CatalogError::InvalidValue {
      key: key.to_string(),
      location: location.to_string(),
    })?;
  if path.is_absolute() {
    return Err(CatalogError::AbsolutePath {
      path,
      location: location.to_string(),
    });
  }
  Ok(path)
}

fn parse_tags(tags: &str, location: &str) -> Result<TagRay, CatalogError> {
  tags.parse().map_err(|source| tag_error(location, source))
}

fn tag_error(location: &str, source: crate::tag::TagError) -> CatalogError {
  CatalogError::Tags {
    location: location.to_string(),
    source,
  }
}

/// Render a YAML scalar as a string.
fn scalar(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}
