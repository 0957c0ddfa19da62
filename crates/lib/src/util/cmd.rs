//! External process execution.
//!
//! Everything the build system delegates to other programs (git, the
//! compiler, the container CLI) runs through here. Unlike hermetic build
//! steps these processes inherit the caller's environment: the tools need
//! the user's `PATH`, credentials and caches.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
  /// Exit code, `None` when terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// stdout followed by stderr, for build logs.
  pub fn combined(&self) -> String {
    match (self.stdout.is_empty(), self.stderr.is_empty()) {
      (_, true) => self.stdout.clone(),
      (true, false) => self.stderr.clone(),
      (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
    }
  }
}

/// Run a program to completion, capturing its output.
///
/// `stdin`, when given, is streamed to the process while its output is
/// collected, so large inputs can't deadlock on full pipes.
pub async fn run_command<I, S>(
  program: &str,
  args: I,
  cwd: Option<&Path>,
  env: &BTreeMap<String, String>,
  stdin: Option<Vec<u8>>,
) -> io::Result<CommandOutput>
where
  I: IntoIterator<Item = S>,
  S: AsRef<OsStr>,
{
  let mut command = Command::new(program);
  command
    .args(args)
    .envs(env)
    .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);
  if let Some(dir) = cwd {
    command.current_dir(dir);
  }

  debug!(program, cwd = ?cwd, "spawning process");
  let mut child = command.spawn()?;

  let writer = match (stdin, child.stdin.take()) {
    (Some(bytes), Some(mut pipe)) => Some(tokio::spawn(async move {
      let result = pipe.write_all(&bytes).await;
      drop(pipe);
      result
    })),
    _ => None,
  };

  let output = child.wait_with_output().await?;

  if let Some(writer) = writer {
    match writer.await {
      Ok(Ok(())) => {}
      // The process stopped reading; its exit status tells the story.
      Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
      Ok(Err(e)) => return Err(e),
      Err(join) => return Err(io::Error::other(join)),
    }
  }

  let result = CommandOutput {
    code: output.status.code(),
    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
  };

  if !result.success() && !result.stderr.is_empty() {
    debug!(program, stderr = %result.stderr, "process failed");
  }

  Ok(result)
}

/// Run a script through the platform shell.
pub async fn run_shell(script: &str, cwd: Option<&Path>, env: &BTreeMap<String, String>) -> io::Result<CommandOutput> {
  let (shell, flag) = shell();
  run_command(shell, [flag, script], cwd, env, None).await
}

#[cfg(unix)]
fn shell() -> (&'static str, &'static str) {
  ("/bin/sh", "-c")
}

#[cfg(windows)]
fn shell() -> (&'static str, &'static str) {
  ("cmd.exe", "/C")
}
