//! External tool invocation.
//!
//! Every call to `make`, `cmake`, the compiler, `llvm-profdata` or the built
//! binary goes through [`ToolCommand`]. Callers decide per call site whether a
//! [`ToolError`] is fatal; this module only reports what happened.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Lines of stderr kept in a [`ToolError::Failed`] for diagnostics.
pub const STDERR_TAIL_LINES: usize = 20;

/// Errors from running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
  /// The process could not be started at all.
  #[error("failed to start {}: {source}", .program.display())]
  Spawn {
    program: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The process ran and exited unsuccessfully.
  #[error("{} exited with code {code:?}{}", .program.display(), format_tail(.stderr_tail))]
  Failed {
    program: PathBuf,
    code: Option<i32>,
    stderr_tail: String,
  },
}

fn format_tail(tail: &str) -> String {
  if tail.is_empty() {
    String::new()
  } else {
    format!(":\n{}", tail)
  }
}

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ToolOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// A single external command with explicit working directory and environment.
#[derive(Debug, Clone)]
pub struct ToolCommand {
  program: PathBuf,
  args: Vec<OsString>,
  cwd: Option<PathBuf>,
  env: Vec<(OsString, OsString)>,
}

impl ToolCommand {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
    self.args.push(arg.as_ref().to_os_string());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
    self
  }

  pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.cwd = Some(dir.as_ref().to_path_buf());
    self
  }

  pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
    self
      .env
      .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
    self
  }

  /// Human-readable command line for logs.
  pub fn display(&self) -> String {
    let mut line = self.program.display().to_string();
    for arg in &self.args {
      line.push(' ');
      line.push_str(&arg.to_string_lossy());
    }
    line
  }

  /// Run to completion and return the captured output whatever the exit code.
  pub async fn output(&self) -> Result<ToolOutput, ToolError> {
    debug!(cmd = %self.display(), cwd = ?self.cwd, "spawning process");

    let mut command = Command::new(&self.program);
    command
      .args(&self.args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }
    for (key, value) in &self.env {
      command.env(key, value);
    }

    let output = command.output().await.map_err(|source| ToolError::Spawn {
      program: self.program.clone(),
      source,
    })?;

    Ok(ToolOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
  }

  /// Run to completion, treating a non-zero exit as an error.
  pub async fn run(&self) -> Result<ToolOutput, ToolError> {
    info!(cmd = %self.display(), "running");
    let output = self.output().await?;

    if !output.success() {
      if !output.stderr.is_empty() {
        debug!(stderr = %output.stderr, "command stderr");
      }
      if !output.stdout.is_empty() {
        debug!(stdout = %output.stdout, "command stdout");
      }
      return Err(ToolError::Failed {
        program: self.program.clone(),
        code: output.code,
        stderr_tail: tail_lines(&output.stderr, STDERR_TAIL_LINES),
      });
    }

    Ok(output)
  }
}

/// Last `n` lines of `text`, trimmed.
pub fn tail_lines(text: &str, n: usize) -> String {
  let lines: Vec<&str> = text.trim_end().lines().collect();
  let start = lines.len().saturating_sub(n);
  lines[start..].join("\n")
}
