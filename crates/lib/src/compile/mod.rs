//! mujs build driver.
//!
//! Every build is clean-then-make in the mujs checkout with an overridden
//! compiler, merged flags and a bounded job count. The binary is only handed
//! out after `make` succeeds, so callers never see a partial artifact.

mod flags;

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::exec::{STDERR_TAIL_LINES, ToolCommand, ToolError, tail_lines};
use crate::platform::PlatformKind;

pub use flags::{CompileFlags, base_flags};

/// Make target that produces the release build.
const MAKE_TARGET: &str = "release";

/// Location of the binary relative to the checkout after a release build.
const BINARY_DIR: &str = "build/release";
const BINARY_STEM: &str = "mujs";

/// Which build in the PGO sequence is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
  Baseline,
  Instrument,
  Optimize,
  Aggressive,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Baseline => "baseline",
      Self::Instrument => "instrument",
      Self::Optimize => "optimize",
      Self::Aggressive => "aggressive",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Errors from a single compile.
#[derive(Debug, Error)]
pub enum CompileError {
  #[error("{stage} build could not start make: {source}")]
  Spawn {
    stage: Stage,
    #[source]
    source: ToolError,
  },

  #[error("{stage} build failed (exit code {code:?}){}", format_stderr(.stderr_tail))]
  Build {
    stage: Stage,
    code: Option<i32>,
    stderr_tail: String,
  },

  #[error("{stage} build succeeded but {} was not produced", .path.display())]
  MissingBinary { stage: Stage, path: PathBuf },
}

impl CompileError {
  pub fn stage(&self) -> Stage {
    match self {
      Self::Spawn { stage, .. } | Self::Build { stage, .. } | Self::MissingBinary { stage, .. } => *stage,
    }
  }
}

fn format_stderr(tail: &str) -> String {
  if tail.is_empty() {
    String::new()
  } else {
    format!(":\n{}", tail)
  }
}

/// The binary produced by the most recent successful compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildArtifact {
  pub path: PathBuf,
  pub exe_name: String,
}

/// Runs `make` for the mujs checkout.
#[derive(Debug, Clone)]
pub struct CompileDriver {
  pub make: PathBuf,
  pub compiler: PathBuf,
  pub source_dir: PathBuf,
  pub jobs: NonZeroUsize,
  pub platform: PlatformKind,
  /// Allocator flags, appended to every stage.
  pub extra: CompileFlags,
}

impl CompileDriver {
  /// Clean and build once with `stage_flags` on top of the base and allocator flags.
  pub async fn compile(&self, stage: Stage, stage_flags: &CompileFlags) -> Result<BuildArtifact, CompileError> {
    self.clean(stage).await;

    let flags = base_flags().merge(stage_flags).merge(&self.extra);
    info!(%stage, cflags = %flags.cflags_string(), ldflags = %flags.ldflags_string(), "compiling mujs");

    let output = ToolCommand::new(&self.make)
      .current_dir(&self.source_dir)
      .arg(format!("-j{}", self.jobs))
      .arg(format!("CC={}", self.compiler.display()))
      .arg(format!("CFLAGS={}", flags.cflags_string()))
      .arg(format!("LDFLAGS={}", flags.ldflags_string()))
      .arg(MAKE_TARGET)
      .output()
      .await
      .map_err(|source| CompileError::Spawn { stage, source })?;

    if !output.success() {
      debug!(%stage, stderr = %output.stderr, "make failed");
      return Err(CompileError::Build {
        stage,
        code: output.code,
        stderr_tail: tail_lines(&output.stderr, STDERR_TAIL_LINES),
      });
    }

    let artifact = self.artifact();
    if !artifact.path.is_file() {
      return Err(CompileError::MissingBinary {
        stage,
        path: artifact.path,
      });
    }

    info!(%stage, path = %artifact.path.display(), "build finished");
    Ok(artifact)
  }

  /// Where a successful build leaves the binary.
  pub fn artifact(&self) -> BuildArtifact {
    let exe_name = format!("{}{}", BINARY_STEM, self.platform.exe_suffix());
    BuildArtifact {
      path: self.source_dir.join(BINARY_DIR).join(&exe_name),
      exe_name,
    }
  }

  /// `make clean`; failure means there was nothing to clean.
  async fn clean(&self, stage: Stage) {
    let result = ToolCommand::new(&self.make)
      .current_dir(&self.source_dir)
      .arg("clean")
      .output()
      .await;

    match result {
      Ok(output) if output.success() => debug!(%stage, "cleaned previous build"),
      Ok(output) => debug!(%stage, code = ?output.code, "nothing to clean"),
      Err(e) => debug!(%stage, error = %e, "clean skipped"),
    }
  }
}
