//! Install and run steps chained after a build.

use tracing::info;

use crate::build::Build;
use crate::target::TargetError;

/// A build deployed to its target.
#[derive(Debug, Clone)]
pub struct Install {
  build: Build,
}

impl Install {
  pub async fn from_build<F>(build: Build, quiet: bool, mut callback: F) -> Result<Self, TargetError>
  where
    F: FnMut(&str),
  {
    callback(&format!("Install {}", build.path().display()));
    build.target().install(build.path(), quiet).await?;
    info!(path = ?build.path(), target = %build.target().name(), "installed");
    Ok(Self { build })
  }

  pub fn build(&self) -> &Build {
    &self.build
  }
}

/// A completed run of an install.
#[derive(Debug, Clone)]
pub struct Runner {
  install: Install,
}

impl Runner {
  /// Run the install. `callback` receives the program's output unless
  /// `silent`.
  pub async fn from_install<F>(install: Install, silent: bool, mut callback: F) -> Result<Self, TargetError>
  where
    F: FnMut(&str),
  {
    let build = install.build();
    build.target().run(build.path(), silent, &mut callback).await?;
    info!(path = ?build.path(), target = %build.target().name(), "run finished");
    Ok(Self { install })
  }

  pub fn install(&self) -> &Install {
    &self.install
  }
}
