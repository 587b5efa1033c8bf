//! Implementation of the `mupy bom` command.

use std::path::Path;

use anyhow::{Context, Result};

use mupy_lib::session::Session;
use mupy_lib::syntax::Reference;

use crate::output::{OutputFormat, indent, print_json};

pub fn cmd_bom(directory: &Path, reference: &str, grade: Option<&str>, output: OutputFormat) -> Result<()> {
  let session = Session::open(directory, grade).context("Failed to open stock")?;
  let reference = Reference::parse(reference).map_err(mupy_lib::Error::from)?;
  let bom = session
    .bom(&reference)
    .with_context(|| format!("Failed to resolve {reference}"))?;

  if output.is_json() {
    return print_json(&bom);
  }
  for node in bom.nodes() {
    println!(
      "{}{} ({})",
      indent(node.depth),
      node.component.name(),
      node.component.ensemble().grade()
    );
  }
  Ok(())
}
