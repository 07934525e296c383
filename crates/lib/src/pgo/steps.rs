//! The operations the PGO controller sequences.
//!
//! [`BuildSteps`] separates the state machine from process execution so every
//! path can be driven by a recording fake. [`MakeSteps`] is the real thing.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::compile::{BuildArtifact, CompileDriver, CompileError, CompileFlags, Stage};
use crate::exec::{ToolCommand, ToolError};
use crate::pgo::training::TrainingRunFailure;
use crate::util::fs::{find_files_with_ext, recreate_dir};

pub const GCC_PROFILE_EXT: &str = "gcda";
pub const LLVM_RAW_PROFILE_EXT: &str = "profraw";

/// Side effects available to the PGO controller.
#[allow(async_fn_in_trait)]
pub trait BuildSteps {
  /// Clean-build the engine with `flags` on top of the base and allocator flags.
  async fn compile(&mut self, stage: Stage, flags: &CompileFlags) -> Result<BuildArtifact, CompileError>;

  /// Run the training workload once with `artifact`, adding `env` to its environment.
  async fn run_sample(
    &mut self,
    sample: u32,
    artifact: &BuildArtifact,
    env: &[(String, String)],
  ) -> Result<(), TrainingRunFailure>;

  /// Remove profile data left by earlier runs.
  fn reset_profiles(&mut self) -> io::Result<()>;

  /// GCC counter files in the profile directory.
  fn gcc_profiles(&self) -> Vec<PathBuf>;

  /// Raw LLVM profiles anywhere under the work tree.
  fn raw_profiles(&self) -> Vec<PathBuf>;

  /// Merge raw LLVM profiles into a single file at `output`.
  async fn merge_profiles(&mut self, raw: &[PathBuf], output: &Path) -> Result<(), ToolError>;
}

/// [`BuildSteps`] backed by `make`, the built binary, and `llvm-profdata`.
#[derive(Debug, Clone)]
pub struct MakeSteps {
  pub driver: CompileDriver,
  pub merge_tool: Option<PathBuf>,
  pub work_dir: PathBuf,
  pub profile_dir: PathBuf,
  pub training_dir: PathBuf,
  pub training_script: PathBuf,
}

impl BuildSteps for MakeSteps {
  async fn compile(&mut self, stage: Stage, flags: &CompileFlags) -> Result<BuildArtifact, CompileError> {
    self.driver.compile(stage, flags).await
  }

  async fn run_sample(
    &mut self,
    sample: u32,
    artifact: &BuildArtifact,
    env: &[(String, String)],
  ) -> Result<(), TrainingRunFailure> {
    let mut command = ToolCommand::new(&artifact.path)
      .arg(&self.training_script)
      .current_dir(&self.training_dir);
    for (key, value) in env {
      command = command.env(key, value);
    }

    let output = command.output().await.map_err(|e| TrainingRunFailure {
      sample,
      reason: e.to_string(),
    })?;
    if !output.success() {
      return Err(TrainingRunFailure {
        sample,
        reason: format!("exit code {:?}", output.code),
      });
    }

    debug!(sample, stdout = %output.stdout.trim(), "training sample finished");
    Ok(())
  }

  fn reset_profiles(&mut self) -> io::Result<()> {
    recreate_dir(&self.profile_dir)?;
    std::fs::create_dir_all(&self.training_dir)?;
    // Only the checkout can hold a default.profraw from an earlier build.
    for stale in find_files_with_ext(&self.driver.source_dir, LLVM_RAW_PROFILE_EXT) {
      debug!(path = %stale.display(), "removing stale raw profile");
      std::fs::remove_file(stale)?;
    }
    Ok(())
  }

  fn gcc_profiles(&self) -> Vec<PathBuf> {
    find_files_with_ext(&self.profile_dir, GCC_PROFILE_EXT)
  }

  fn raw_profiles(&self) -> Vec<PathBuf> {
    find_files_with_ext(&self.work_dir, LLVM_RAW_PROFILE_EXT)
  }

  async fn merge_profiles(&mut self, raw: &[PathBuf], output: &Path) -> Result<(), ToolError> {
    let tool = self.merge_tool.as_ref().ok_or_else(|| ToolError::Spawn {
      program: PathBuf::from("llvm-profdata"),
      source: io::Error::new(io::ErrorKind::NotFound, "profile merge tool not available"),
    })?;

    ToolCommand::new(tool)
      .arg("merge")
      .arg(format!("-output={}", output.display()))
      .args(raw)
      .run()
      .await?;
    Ok(())
  }
}
