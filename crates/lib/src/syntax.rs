//! Identifier and reference syntax.
//!
//! Identifiers name ensembles, parts, import aliases and tags. References
//! name an entry point: `ensemble^entry@target`, with `+` accepted in place
//! of `^` for older command lines.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

const IDENTIFIER: &str = r"[_a-zA-Z][_a-zA-Z0-9]*";

static IDENTIFIER_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(&format!("^{IDENTIFIER}$")).expect("identifier pattern is valid"));

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(&format!(r"^({IDENTIFIER})(?:[\^+]({IDENTIFIER}))?(?:@({IDENTIFIER}))?$"))
    .expect("reference pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
  #[error("invalid identifier '{value}'{}", at(.location))]
  Identifier { value: String, location: Option<String> },

  #[error("invalid reference '{value}', expected ensemble^entry[@target]")]
  Reference { value: String },

  #[error("reference '{value}' names no entry part")]
  MissingEntry { value: String },
}

fn at(location: &Option<String>) -> String {
  location.as_ref().map(|l| format!(" at {l}")).unwrap_or_default()
}

/// Returns true if `value` is a well-formed identifier.
pub fn is_identifier(value: &str) -> bool {
  IDENTIFIER_RE.is_match(value)
}

/// Check an identifier, reporting `location` on failure.
pub fn identifier(value: &str, location: Option<&str>) -> Result<String, SyntaxError> {
  if is_identifier(value) {
    Ok(value.to_string())
  } else {
    Err(SyntaxError::Identifier {
      value: value.to_string(),
      location: location.map(str::to_string),
    })
  }
}

/// A parsed `ensemble^entry@target` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
  pub ensemble: String,
  pub entry: Option<String>,
  pub target: Option<String>,
}

impl Reference {
  pub fn parse(value: &str) -> Result<Self, SyntaxError> {
    let captures = REFERENCE_RE.captures(value).ok_or_else(|| SyntaxError::Reference {
      value: value.to_string(),
    })?;
    Ok(Self {
      ensemble: captures[1].to_string(),
      entry: captures.get(2).map(|m| m.as_str().to_string()),
      target: captures.get(3).map(|m| m.as_str().to_string()),
    })
  }

  /// The entry part, required by every pipeline stage past the stock.
  pub fn require_entry(&self) -> Result<&str, SyntaxError> {
    self.entry.as_deref().ok_or_else(|| SyntaxError::MissingEntry {
      value: self.to_string(),
    })
  }

  /// `ensemble^entry`, used to name kit, compile and install directories.
  pub fn entry_name(&self) -> Result<String, SyntaxError> {
    Ok(entry_name(&self.ensemble, self.require_entry()?))
  }
}

impl fmt::Display for Reference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.ensemble)?;
    if let Some(entry) = &self.entry {
      write!(f, "^{entry}")?;
    }
    if let Some(target) = &self.target {
      write!(f, "@{target}")?;
    }
    Ok(())
  }
}

pub fn entry_name(ensemble: &str, part: &str) -> String {
  format!("{ensemble}^{part}")
}
