//! Detached containers of mupy images, driven through the Docker API.

use std::path::{Path, PathBuf};

use bollard::Docker;
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
  CreateContainerOptionsBuilder, RemoveContainerOptionsBuilder, StartContainerOptions, StopContainerOptionsBuilder,
};
use tracing::{debug, info, warn};

use super::{LogStream, TargetError, mode};

const NETWORK_MODE: &str = "host";
const STOP_TIMEOUT_SECS: i32 = 1;

/// A detached run of a mupy image whose logs are followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
  pub image: String,
  pub name: String,
  /// (host path, container path), mounted read-write
  pub volumes: Vec<(PathBuf, PathBuf)>,
  pub working_dir: Option<PathBuf>,
  pub args: Vec<String>,
}

impl ContainerSpec {
  /// A container of the image for target type `kind`.
  pub fn new(kind: &str, name: &str, args: Vec<String>) -> Self {
    Self {
      image: mode::image_tag(kind),
      name: name.to_string(),
      volumes: Vec::new(),
      working_dir: None,
      args,
    }
  }

  pub fn volume(mut self, host: &Path, container: &Path) -> Self {
    self.volumes.push((host.to_path_buf(), container.to_path_buf()));
    self
  }

  pub fn working_dir(mut self, dir: &Path) -> Self {
    self.working_dir = Some(dir.to_path_buf());
    self
  }

  /// Bind mounts in `host:container:rw` form.
  pub fn binds(&self) -> Vec<String> {
    self
      .volumes
      .iter()
      .map(|(host, container)| format!("{}:{}:rw", host.display(), container.display()))
      .collect()
  }

  pub fn create_body(&self) -> ContainerCreateBody {
    ContainerCreateBody {
      image: Some(self.image.clone()),
      cmd: Some(self.args.clone()),
      working_dir: self.working_dir.as_ref().map(|dir| dir.display().to_string()),
      host_config: Some(HostConfig {
        binds: Some(self.binds()),
        network_mode: Some(NETWORK_MODE.to_string()),
        ..Default::default()
      }),
      ..Default::default()
    }
  }

  /// `<image> <args>`, for messages.
  pub fn describe(&self) -> String {
    std::iter::once(self.image.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }

  /// Create and start the container detached, then follow its logs.
  pub async fn spawn(&self) -> Result<LogStream, TargetError> {
    let docker = connect()?;
    remove_container(&docker, &self.name).await?;

    let options = CreateContainerOptionsBuilder::default().name(&self.name).build();
    let created = docker
      .create_container(Some(options), self.create_body())
      .await
      .map_err(|source| TargetError::docker("create container", source))?;
    for warning in &created.warnings {
      warn!(container = %self.name, "{warning}");
    }

    if let Err(source) = docker.start_container(&created.id, None::<StartContainerOptions>).await {
      if let Err(e) = remove_container(&docker, &created.id).await {
        warn!(container = %created.id, error = %e, "failed to remove unstarted container");
      }
      return Err(TargetError::docker("start container", source));
    }
    info!(container = %self.name, id = %created.id, image = %self.image, "container started");
    Ok(LogStream::follow_container(docker, created.id, self.describe()))
  }
}

/// A client for the local Docker daemon.
pub(super) fn connect() -> Result<Docker, TargetError> {
  Docker::connect_with_local_defaults().map_err(|source| TargetError::docker("connect", source))
}

/// Stop a running container, waiting at most one second before killing it.
pub(super) async fn stop_container(docker: &Docker, id: &str) -> Result<(), TargetError> {
  let options = StopContainerOptionsBuilder::default().t(STOP_TIMEOUT_SECS).build();
  match docker.stop_container(id, Some(options)).await {
    Ok(()) => {
      debug!(container = %id, "container stopped");
      Ok(())
    }
    // 304: already stopped
    Err(DockerError::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
    Err(source) => Err(TargetError::docker("stop container", source)),
  }
}

/// Force-remove a container by name or id. A missing container is not an error.
pub(super) async fn remove_container(docker: &Docker, id: &str) -> Result<(), TargetError> {
  let options = RemoveContainerOptionsBuilder::default().force(true).build();
  match docker.remove_container(id, Some(options)).await {
    Ok(()) => {
      debug!(container = %id, "container removed");
      Ok(())
    }
    Err(DockerError::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
    Err(source) => Err(TargetError::docker("remove container", source)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn spec() -> ContainerSpec {
    ContainerSpec::new("cpython", "cpython-run", vec!["python".to_string(), "-u".to_string()])
      .volume(Path::new("/b/install"), Path::new("/flash"))
      .working_dir(Path::new("/flash"))
  }

  #[test]
  fn create_body_mounts_and_runs() {
    let body = spec().create_body();
    assert_eq!(body.image.as_deref(), Some("mupy:cpython"));
    assert_eq!(body.cmd, Some(vec!["python".to_string(), "-u".to_string()]));
    assert_eq!(body.working_dir.as_deref(), Some("/flash"));

    let host = body.host_config.unwrap();
    assert_eq!(host.binds, Some(vec!["/b/install:/flash:rw".to_string()]));
    assert_eq!(host.network_mode.as_deref(), Some("host"));
  }

  #[test]
  fn no_working_dir_by_default() {
    let body = ContainerSpec::new("micropython", "x", vec![]).create_body();
    assert_eq!(body.working_dir, None);
    assert_eq!(body.image.as_deref(), Some("mupy:micropython"));
  }

  #[test]
  fn describes_image_and_command() {
    assert_eq!(spec().describe(), "mupy:cpython python -u");
  }
}
