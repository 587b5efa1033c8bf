//! Shell hook execution.
//!
//! Hooks run through the configured shell with exactly the configured
//! environment. The previous hook's output is fed to the next one's stdin.

use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ShellConfig;

#[derive(Debug, Error)]
pub enum HookError {
  #[error("failed to start '{command}': {source}")]
  Spawn { command: String, source: std::io::Error },

  #[error("hook '{command}' failed with exit code {}{}", exit_code(.code), trailer(.output))]
  Failed {
    command: String,
    code: Option<i32>,
    output: String,
  },
}

fn exit_code(code: &Option<i32>) -> String {
  code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

fn trailer(output: &str) -> String {
  if output.trim().is_empty() {
    String::new()
  } else {
    format!(":\n{}", output.trim_end())
  }
}

/// Run one hook command, feeding `input` to its stdin.
///
/// # Returns
///
/// The command's stdout followed by its stderr.
pub async fn run_hook(command: &str, input: &str, shell: &ShellConfig) -> Result<String, HookError> {
  info!(cmd = %command, "running hook");

  let mut child = Command::new(&shell.bin)
    .arg("-c")
    .arg(command)
    .current_dir(&shell.cwd)
    .env_clear()
    .envs(&shell.env)
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .spawn()
    .map_err(|source| HookError::Spawn {
      command: command.to_string(),
      source,
    })?;

  let stdin = child.stdin.take();
  let input = input.as_bytes().to_vec();
  let feed = async move {
    if let Some(mut stdin) = stdin {
      // A hook that never reads stdin closes the pipe early.
      if let Err(e) = stdin.write_all(&input).await {
        debug!(error = %e, "hook did not consume its input");
      }
    }
  };
  let (_, output) = tokio::join!(feed, child.wait_with_output());
  let output = output.map_err(|source| HookError::Spawn {
    command: command.to_string(),
    source,
  })?;

  let mut text = String::from_utf8_lossy(&output.stdout).to_string();
  text.push_str(&String::from_utf8_lossy(&output.stderr));

  if !output.status.success() {
    return Err(HookError::Failed {
      command: command.to_string(),
      code: output.status.code(),
      output: text,
    });
  }

  if !text.is_empty() {
    debug!(output = %text.trim_end(), "hook output");
  }
  Ok(text)
}
