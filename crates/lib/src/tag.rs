//! Tag rays and tag-indexed alternatives.
//!
//! A [`TagRay`] is a set of positive tags written `+tagA+tagB`. A
//! [`TagIndex`] maps distinct rays to alternatives (paths, shell hooks,
//! substitution variables) and selects the most specific alternative whose
//! ray is contained in a query ray.
//!
//! Negative tags (`-tag`) parse but are rejected until they are given a
//! meaning.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static TAGS_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^([+-][_a-zA-Z][_a-zA-Z0-9]*)+$").expect("tag pattern is valid"));

static TAG_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[+-][_a-zA-Z][_a-zA-Z0-9]*").expect("tag pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
  #[error("invalid tag string '{0}'")]
  Syntax(String),

  #[error("minus tags ('-tag') not implemented: '{0}'")]
  NotImplemented(String),

  #[error("duplicate tags '{0}'")]
  Duplicate(TagRay),

  #[error("no entry matches tags '{0}'")]
  NoMatch(TagRay),

  #[error("tags '{first}' and '{second}' both match '{query}'")]
  Ambiguous { first: TagRay, second: TagRay, query: TagRay },
}

/// An immutable set of positive tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagRay {
  tags: BTreeSet<String>,
}

impl TagRay {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn from_tags<I, S>(tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      tags: tags.into_iter().map(Into::into).collect(),
    }
  }

  /// Union of this ray with others.
  pub fn plus(&self, other: &TagRay) -> Self {
    Self {
      tags: self.tags.union(&other.tags).cloned().collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.tags.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tags.is_empty()
  }

  pub fn is_subset(&self, other: &TagRay) -> bool {
    self.tags.is_subset(&other.tags)
  }

  pub fn contains(&self, tag: &str) -> bool {
    self.tags.contains(tag)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.tags.iter().map(String::as_str)
  }
}

impl FromStr for TagRay {
  type Err = TagError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if matches!(s, "" | "+" | "-") {
      return Ok(Self::empty());
    }
    let signed = if s.starts_with(['+', '-']) {
      s.to_string()
    } else {
      format!("+{s}")
    };
    if !TAGS_RE.is_match(&signed) {
      return Err(TagError::Syntax(s.to_string()));
    }
    let mut plus = BTreeSet::new();
    for token in TAG_RE.find_iter(&signed).map(|m| m.as_str()) {
      match token.split_at(1) {
        ("+", tag) => {
          plus.insert(tag.to_string());
        }
        _ => return Err(TagError::NotImplemented(s.to_string())),
      }
    }
    Ok(Self { tags: plus })
  }
}

impl fmt::Display for TagRay {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for tag in &self.tags {
      write!(f, "+{tag}")?;
    }
    Ok(())
  }
}

impl serde::Serialize for TagRay {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// Rays are partially ordered by inclusion.
impl PartialOrd for TagRay {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    match (self.is_subset(other), other.is_subset(self)) {
      (true, true) => Some(Ordering::Equal),
      (true, false) => Some(Ordering::Less),
      (false, true) => Some(Ordering::Greater),
      (false, false) => None,
    }
  }
}

/// Alternatives keyed by distinct tag rays.
#[derive(Debug, Clone)]
pub struct TagIndex<T> {
  entries: Vec<(TagRay, T)>,
}

impl<T> Default for TagIndex<T> {
  fn default() -> Self {
    Self { entries: Vec::new() }
  }
}

impl<T> TagIndex<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, ray: TagRay, item: T) -> Result<(), TagError> {
    if self.entries.iter().any(|(r, _)| *r == ray) {
      return Err(TagError::Duplicate(ray));
    }
    self.entries.push((ray, item));
    Ok(())
  }

  /// The item whose ray is the largest subset of `query`.
  ///
  /// Two largest subsets of equal size are an error rather than a tie-break.
  pub fn max(&self, query: &TagRay) -> Result<&T, TagError> {
    let mut matches: Vec<&(TagRay, T)> = self.entries.iter().filter(|(r, _)| r.is_subset(query)).collect();
    matches.sort_by_key(|(r, _)| std::cmp::Reverse(r.len()));
    let Some(&first) = matches.first() else {
      return Err(TagError::NoMatch(query.clone()));
    };
    if let Some(&second) = matches.get(1)
      && second.0.len() == first.0.len()
    {
      return Err(TagError::Ambiguous {
        first: first.0.clone(),
        second: second.0.clone(),
        query: query.clone(),
      });
    }
    Ok(&first.1)
  }

  /// Like [`TagIndex::max`] but treating "no match" as absent.
  pub fn max_or_none(&self, query: &TagRay) -> Result<Option<&T>, TagError> {
    match self.max(query) {
      Ok(item) => Ok(Some(item)),
      Err(TagError::NoMatch(_)) => Ok(None),
      Err(e) => Err(e),
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&TagRay, &T)> {
    self.entries.iter().map(|(r, t)| (r, t))
  }
}
