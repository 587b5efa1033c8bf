//! Placeholder parsing and substitution for shell hook templates.
//!
//! Hook commands name substitution variables in braces, e.g.
//! `cp {this} {there}/{name}.py`. Doubled braces (`{{`, `}}`) produce
//! literal braces, so shell constructs like `${HOME}` are written `${{HOME}}`.
//!
//! # Example
//!
//! ```
//! use mupy_lib::placeholder::{parse, Segment};
//!
//! let segments = parse("echo {name} >> {{log}}").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Literal("echo ".to_string()),
//!     Segment::Placeholder("name".to_string()),
//!     Segment::Literal(" >> {log}".to_string()),
//! ]);
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

use crate::syntax::is_identifier;

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text, with escaped braces already collapsed
  Literal(String),

  /// A variable to be resolved
  Placeholder(String),
}

/// Errors that can occur during placeholder parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("single '}}' at position {0}")]
  StrayClose(usize),

  #[error("malformed placeholder: '{0}'")]
  Malformed(String),

  #[error("unresolved placeholder: '{0}'")]
  Unresolved(String),
}

/// Trait for resolving placeholder values.
pub trait Resolver {
  fn resolve(&self, name: &str) -> Result<&str, PlaceholderError>;
}

impl Resolver for BTreeMap<String, String> {
  fn resolve(&self, name: &str) -> Result<&str, PlaceholderError> {
    self
      .get(name)
      .map(String::as_str)
      .ok_or_else(|| PlaceholderError::Unresolved(name.to_string()))
  }
}

/// Parse a template into segments.
///
/// # Errors
///
/// Returns an error for an unclosed `{`, a lone `}`, or a placeholder whose
/// content is not an identifier.
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    match ch {
      '{' if matches!(chars.peek(), Some((_, '{'))) => {
        chars.next();
        literal.push('{');
      }
      '}' if matches!(chars.peek(), Some((_, '}'))) => {
        chars.next();
        literal.push('}');
      }
      '}' => return Err(PlaceholderError::StrayClose(pos)),
      '{' => {
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }

        let mut content = String::new();
        let mut found_close = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            found_close = true;
            break;
          }
          content.push(c);
        }
        if !found_close {
          return Err(PlaceholderError::Unclosed(pos));
        }
        if !is_identifier(&content) {
          return Err(PlaceholderError::Malformed(content));
        }
        segments.push(Segment::Placeholder(content));
      }
      _ => literal.push(ch),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Parse and substitute in one step.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

/// Substitute placeholders in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let mut result = String::new();
  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(name) => result.push_str(resolver.resolve(name)?),
    }
  }
  Ok(result)
}
