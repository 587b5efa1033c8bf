//! CLI output formatting.
//!
//! Progress from the pipeline arrives through callbacks and is printed here,
//! so `--quiet` can silence it in one place.

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use mupy_lib::kit::KitEvent;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Prints pipeline progress unless quiet.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
  quiet: bool,
}

impl Progress {
  pub fn new(quiet: bool) -> Self {
    Self { quiet }
  }

  pub fn is_quiet(self) -> bool {
    self.quiet
  }

  pub fn line(self, line: &str) {
    if !self.quiet {
      println!("{line}");
    }
  }

  pub fn kit_event(self, event: KitEvent<'_>) {
    if self.quiet {
      return;
    }
    match event {
      KitEvent::Hook { command, output } => {
        println!("{} {}", "$".if_supports_color(Stream::Stdout, |s| s.dimmed()), command);
        for line in output.lines() {
          println!("  {line}");
        }
      }
      KitEvent::Copy { from, to } => println!(
        "{} {} {}",
        from.display(),
        symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.dimmed()),
        to.display()
      ),
    }
  }

  pub fn success(self, message: &str) {
    if !self.quiet {
      print_success(message);
    }
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Report a failed command as `error[<kind>]: <message>`.
///
/// The message is the one-line cause chain. With `debug` the full chain
/// follows, one cause per line.
pub fn print_failure(err: &anyhow::Error, debug: bool) {
  let label = match error_kind(err) {
    Some(kind) => format!("error[{kind}]:"),
    None => "error:".to_string(),
  };
  eprintln!(
    "{} {}",
    label.if_supports_color(Stream::Stderr, |s| s.red()),
    format!("{err:#}").if_supports_color(Stream::Stderr, |s| s.red())
  );
  if debug {
    for (depth, cause) in err.chain().enumerate().skip(1) {
      eprintln!("  {} {depth}: {cause}", symbols::ERROR);
    }
  }
}

/// Kind of the first library error in the chain.
pub fn error_kind(err: &anyhow::Error) -> Option<mupy_lib::ErrorKind> {
  err
    .chain()
    .find_map(|cause| cause.downcast_ref::<mupy_lib::Error>())
    .map(mupy_lib::Error::kind)
}

/// Indentation for a BOM node at `depth`.
pub fn indent(depth: usize) -> String {
  "  ".repeat(depth)
}
