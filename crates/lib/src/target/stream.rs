//! Scoped output of a backend.
//!
//! A [`LogStream`] yields the output lines of a child process or of a
//! followed container. [`LogStream::close`] tears the backend down and reports
//! failures; dropping an unfinished stream does the same in the background,
//! so teardown happens on every exit path.

use std::collections::VecDeque;
use std::process::Stdio;

use bollard::Docker;
use bollard::errors::Error as DockerError;
use bollard::query_parameters::{LogsOptionsBuilder, WaitContainerOptions};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::TargetError;
use super::container::{remove_container, stop_container};

#[derive(Debug)]
pub struct LogStream {
  inner: Inner,
}

#[derive(Debug)]
enum Inner {
  Buffered(VecDeque<String>),
  Process(ProcessStream),
  Container(ContainerStream),
}

#[derive(Debug)]
struct ProcessStream {
  child: Child,
  lines: mpsc::UnboundedReceiver<String>,
  command: String,
  finished: bool,
}

#[derive(Debug)]
struct ContainerStream {
  docker: Docker,
  id: String,
  lines: mpsc::UnboundedReceiver<Result<String, DockerError>>,
  command: String,
  finished: bool,
}

impl LogStream {
  /// A stream over output that is already complete.
  pub fn buffered(lines: Vec<String>) -> Self {
    Self {
      inner: Inner::Buffered(lines.into()),
    }
  }

  /// Spawn `command` and stream its merged stdout and stderr.
  pub fn spawn(mut command: Command, program: &str) -> Result<Self, TargetError> {
    let description = describe(&command);
    debug!(cmd = %description, "spawning backend");
    command
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    let mut child = command
      .spawn()
      .map_err(|source| TargetError::spawn(program, description.clone(), source))?;

    let (tx, rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
      forward(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
      forward(stderr, tx);
    }

    Ok(Self {
      inner: Inner::Process(ProcessStream {
        child,
        lines: rx,
        command: description,
        finished: false,
      }),
    })
  }

  /// Follow the logs of the started container `id` until it exits.
  pub(super) fn follow_container(docker: Docker, id: String, command: String) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    follow_logs(docker.clone(), id.clone(), tx);
    Self {
      inner: Inner::Container(ContainerStream {
        docker,
        id,
        lines: rx,
        command,
        finished: false,
      }),
    }
  }

  /// The next output line, or `None` once the backend has exited
  /// successfully.
  pub async fn next_line(&mut self) -> Result<Option<String>, TargetError> {
    match &mut self.inner {
      Inner::Buffered(lines) => Ok(lines.pop_front()),
      Inner::Process(process) => {
        if let Some(line) = process.lines.recv().await {
          return Ok(Some(line));
        }
        if process.finished {
          return Ok(None);
        }
        let status = process.child.wait().await.map_err(|source| TargetError::Spawn {
          command: process.command.clone(),
          source,
        })?;
        process.finished = true;
        if status.success() {
          Ok(None)
        } else {
          Err(TargetError::BackendFailed {
            command: process.command.clone(),
            code: status.code(),
          })
        }
      }
      Inner::Container(container) => {
        if let Some(line) = container.lines.recv().await {
          return line
            .map(Some)
            .map_err(|source| TargetError::docker("follow container logs", source));
        }
        if container.finished {
          return Ok(None);
        }
        let code = container.wait().await?;
        container.finished = true;
        remove_container(&container.docker, &container.id).await?;
        if code == Some(0) {
          Ok(None)
        } else {
          Err(TargetError::BackendFailed {
            command: container.command.clone(),
            code,
          })
        }
      }
    }
  }

  /// Relay every line to `callback` until the backend exits.
  pub async fn drain<F>(mut self, mut callback: F) -> Result<(), TargetError>
  where
    F: FnMut(&str),
  {
    while let Some(line) = self.next_line().await? {
      callback(&line);
    }
    Ok(())
  }

  /// Stop an unfinished backend: kill the process, or stop and remove the
  /// container.
  pub async fn close(mut self) -> Result<(), TargetError> {
    match &mut self.inner {
      Inner::Buffered(_) => Ok(()),
      Inner::Process(process) => {
        if !process.finished {
          process.finished = true;
          if let Err(e) = process.child.kill().await {
            debug!(error = %e, "backend already exited");
          }
        }
        Ok(())
      }
      Inner::Container(container) => {
        if container.finished {
          return Ok(());
        }
        container.finished = true;
        stop_container(&container.docker, &container.id).await?;
        remove_container(&container.docker, &container.id).await
      }
    }
  }
}

impl ContainerStream {
  /// Exit code of the container once it stops.
  async fn wait(&self) -> Result<Option<i32>, TargetError> {
    let mut waits = Box::pin(self.docker.wait_container(&self.id, None::<WaitContainerOptions>));
    match waits.next().await {
      Some(Ok(response)) => Ok(i32::try_from(response.status_code).ok()),
      // Non-zero exits arrive as this error.
      Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(i32::try_from(code).ok()),
      Some(Err(source)) => Err(TargetError::docker("wait for container", source)),
      None => Ok(None),
    }
  }
}

impl Drop for LogStream {
  fn drop(&mut self) {
    match &mut self.inner {
      Inner::Buffered(_) => {}
      Inner::Process(process) => {
        if !process.finished
          && let Err(e) = process.child.start_kill()
        {
          debug!(error = %e, "backend already exited");
        }
      }
      Inner::Container(container) => {
        if container.finished {
          return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
          warn!(container = %container.id, "no runtime left to stop container");
          return;
        };
        let docker = container.docker.clone();
        let id = container.id.clone();
        handle.spawn(async move {
          let result = match stop_container(&docker, &id).await {
            Ok(()) => remove_container(&docker, &id).await,
            Err(e) => Err(e),
          };
          if let Err(e) = result {
            warn!(container = %id, error = %e, "failed to stop container");
          }
        });
      }
    }
  }
}

fn forward<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
  R: AsyncRead + Unpin + Send + 'static,
{
  tokio::spawn(async move {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
      if tx.send(line).is_err() {
        break;
      }
    }
  });
}

fn follow_logs(docker: Docker, id: String, tx: mpsc::UnboundedSender<Result<String, DockerError>>) {
  tokio::spawn(async move {
    let options = LogsOptionsBuilder::default()
      .follow(true)
      .stdout(true)
      .stderr(true)
      .build();
    let mut logs = Box::pin(docker.logs(&id, Some(options)));
    let mut buffer = LineBuffer::default();
    while let Some(chunk) = logs.next().await {
      let lines = match chunk {
        Ok(output) => buffer.push(&output.to_string()),
        Err(e) => {
          if tx.send(Err(e)).is_err() {
            debug!(container = %id, "log reader gone");
          }
          return;
        }
      };
      for line in lines {
        if tx.send(Ok(line)).is_err() {
          return;
        }
      }
    }
    if let Some(line) = buffer.finish()
      && tx.send(Ok(line)).is_err()
    {
      debug!(container = %id, "log reader gone");
    }
  });
}

/// Splits log chunks, which may end mid-line, into whole lines.
#[derive(Debug, Default)]
struct LineBuffer {
  pending: String,
}

impl LineBuffer {
  fn push(&mut self, chunk: &str) -> Vec<String> {
    self.pending.push_str(chunk);
    let mut lines = Vec::new();
    while let Some(end) = self.pending.find('\n') {
      let line: String = self.pending.drain(..=end).collect();
      lines.push(line.trim_end_matches(['\n', '\r']).to_string());
    }
    lines
  }

  fn finish(self) -> Option<String> {
    (!self.pending.is_empty()).then_some(self.pending)
  }
}

/// Render a command for messages, e.g. `python3 -c ...`.
fn describe(command: &Command) -> String {
  let inner = command.as_std();
  std::iter::once(inner.get_program())
    .chain(inner.get_args())
    .map(|s| s.to_string_lossy().to_string())
    .collect::<Vec<_>>()
    .join(" ")
}
