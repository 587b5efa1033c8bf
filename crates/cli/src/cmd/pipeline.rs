//! Implementation of the `mupy kit`, `build`, `install` and `run` commands.
//!
//! Each command runs every stage before it: `run` kits, builds and installs
//! first.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use mupy_lib::build::Build;
use mupy_lib::deploy::{Install, Runner};
use mupy_lib::kit::Kit;
use mupy_lib::session::Session;
use mupy_lib::syntax::Reference;
use mupy_lib::tag::TagRay;
use mupy_lib::target::Target;

use super::runtime;
use crate::output::Progress;

#[derive(Args, Debug)]
pub struct PipelineArgs {
  /// Reference, e.g. pkg^hello@ghost
  pub reference: String,

  /// Ignore grade levels above this one
  #[arg(short, long)]
  pub grade: Option<String>,

  /// Tags added to the target's, e.g. +debug
  #[arg(short, long)]
  pub tags: Option<String>,
}

/// A reference resolved against an open session.
struct Pipeline {
  session: Session,
  reference: Reference,
  target: Target,
  tags: TagRay,
  progress: Progress,
}

impl Pipeline {
  fn open(directory: &Path, args: &PipelineArgs, progress: Progress) -> Result<Self> {
    let session = Session::open(directory, args.grade.as_deref()).context("Failed to open stock")?;
    let reference = Reference::parse(&args.reference).map_err(mupy_lib::Error::from)?;
    let target = session.target(&reference).context("Failed to select target")?;
    let tags = args
      .tags
      .as_deref()
      .unwrap_or("")
      .parse::<TagRay>()
      .map_err(mupy_lib::Error::from)
      .context("Invalid --tags")?;
    debug!(reference = %reference, target = %target.name(), tags = %tags, "pipeline ready");
    Ok(Self {
      session,
      reference,
      target,
      tags,
      progress,
    })
  }

  async fn kit(&self) -> Result<Kit> {
    let progress = self.progress;
    let kit = self
      .session
      .kit(&self.reference, &self.target, &self.tags, |event| progress.kit_event(event))
      .await
      .with_context(|| format!("Failed to kit {}", self.reference))?;
    progress.success(&format!("Kit {}", kit.path().display()));
    Ok(kit)
  }

  async fn build(&self) -> Result<Build> {
    let kit = self.kit().await?;
    let progress = self.progress;
    let build = self
      .session
      .build(&self.reference, &kit, &self.target, |line| progress.line(line))
      .await
      .with_context(|| format!("Failed to build {} for {}", self.reference, self.target.name()))?;
    progress.success(&format!("Build {}", build.path().display()));
    Ok(build)
  }

  async fn install(&self) -> Result<Install> {
    let build = self.build().await?;
    let progress = self.progress;
    Install::from_build(build, progress.is_quiet(), |line| progress.line(line))
      .await
      .map_err(mupy_lib::Error::from)
      .with_context(|| format!("Failed to install on {}", self.target.name()))
  }

  async fn run(&self, silent: bool) -> Result<Runner> {
    let install = self.install().await?;
    self
      .progress
      .line(&format!("Run {} on {}", self.reference, self.target.name()));
    Runner::from_install(install, silent, |line| println!("{line}"))
      .await
      .map_err(mupy_lib::Error::from)
      .with_context(|| format!("Failed to run on {}", self.target.name()))
  }
}

pub fn cmd_kit(directory: &Path, args: &PipelineArgs, progress: Progress) -> Result<()> {
  let pipeline = Pipeline::open(directory, args, progress)?;
  runtime()?.block_on(pipeline.kit())?;
  Ok(())
}

pub fn cmd_build(directory: &Path, args: &PipelineArgs, progress: Progress) -> Result<()> {
  let pipeline = Pipeline::open(directory, args, progress)?;
  runtime()?.block_on(pipeline.build())?;
  Ok(())
}

pub fn cmd_install(directory: &Path, args: &PipelineArgs, progress: Progress) -> Result<()> {
  let pipeline = Pipeline::open(directory, args, progress)?;
  runtime()?.block_on(pipeline.install())?;
  Ok(())
}

pub fn cmd_run(directory: &Path, args: &PipelineArgs, silent: bool, progress: Progress) -> Result<()> {
  let pipeline = Pipeline::open(directory, args, progress)?;
  runtime()?.block_on(pipeline.run(silent))?;
  Ok(())
}
