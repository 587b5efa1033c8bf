//! Container images backing the docker and cross targets.

use std::path::PathBuf;

use bollard::query_parameters::{BuildImageOptionsBuilder, ListImagesOptionsBuilder, RemoveImageOptionsBuilder};
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info};

use super::TargetError;
use super::container::connect;
use crate::consts::APP_NAME;

/// Repository of every mupy image.
pub const IMAGE_REPOSITORY: &str = APP_NAME;

const DOCKERFILE: &str = "Dockerfile";

/// `mupy:<type>`
pub fn image_tag(kind: &str) -> String {
  format!("{IMAGE_REPOSITORY}:{kind}")
}

/// Whether `tag` (`repository:tag`) belongs to the mupy repository.
fn in_repository(tag: &str) -> bool {
  tag.rsplit_once(':').is_some_and(|(repository, _)| repository == IMAGE_REPOSITORY)
}

/// An image recipe for one target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mode {
  name: String,
  dockerfile: String,
  message: Option<String>,
}

impl Mode {
  pub fn docker(name: &str, dockerfile: String, message: Option<String>) -> Self {
    Self {
      name: name.to_string(),
      dockerfile,
      message,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn dockerfile(&self) -> &str {
    &self.dockerfile
  }

  pub fn tag(&self) -> String {
    image_tag(&self.name)
  }

  /// A build context holding only the Dockerfile.
  pub fn build_context(&self) -> std::io::Result<Vec<u8>> {
    let content = self.dockerfile.as_bytes();
    let mut archive = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_mode(0o644);
    header.set_size(content.len() as u64);
    header.set_cksum();
    archive.append_data(&mut header, DOCKERFILE, content)?;
    archive.into_inner()
  }

  /// Build the image from the Dockerfile content.
  pub async fn install_image<F>(&self, mut callback: F) -> Result<(), TargetError>
  where
    F: FnMut(&str),
  {
    let tag = self.tag();
    if let Some(message) = &self.message {
      callback(&format!("Installing Docker image {tag}; {message}..."));
    }
    info!(image = %tag, "building image");
    let context = self.build_context().map_err(|source| TargetError::Write {
      path: PathBuf::from(DOCKERFILE),
      source,
    })?;

    let docker = connect()?;
    let options = BuildImageOptionsBuilder::default()
      .dockerfile(DOCKERFILE)
      .t(&tag)
      .rm(true)
      .build();
    let mut progress = Box::pin(docker.build_image(options, None, Some(bollard::body_full(Bytes::from(context)))));
    while let Some(info) = progress.next().await {
      let info = info.map_err(|source| TargetError::docker("build image", source))?;
      if let Some(message) = info.error_detail.and_then(|detail| detail.message) {
        return Err(TargetError::ImageBuild { image: tag, message });
      }
      if let Some(stream) = info.stream {
        for line in stream.lines().filter(|line| !line.trim().is_empty()) {
          callback(line);
        }
      }
    }
    callback(&format!("Installed Docker image {tag}"));
    Ok(())
  }
}

/// Force-remove every image in the mupy repository. Returns the number removed.
pub async fn remove_all_images<F>(mut callback: F) -> Result<usize, TargetError>
where
  F: FnMut(&str),
{
  let docker = connect()?;
  let images = docker
    .list_images(Some(ListImagesOptionsBuilder::default().all(false).build()))
    .await
    .map_err(|source| TargetError::docker("list images", source))?;
  let ours: Vec<(String, String)> = images
    .into_iter()
    .filter_map(|image| {
      let tag = image.repo_tags.iter().find(|tag| in_repository(tag))?.clone();
      Some((image.id, tag))
    })
    .collect();
  debug!(count = ours.len(), "found mupy images");

  for (id, tag) in &ours {
    let options = RemoveImageOptionsBuilder::default().force(true).build();
    docker
      .remove_image(id, Some(options), None)
      .await
      .map_err(|source| TargetError::docker("remove image", source))?;
    callback(&format!("Removed Docker image {tag} {id}"));
  }
  Ok(ours.len())
}
