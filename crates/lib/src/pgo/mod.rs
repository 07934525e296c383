//! Profile-guided optimization controller.
//!
//! Drives [`BuildSteps`] through one of these paths:
//!
//! ```text
//! Start ─(pgo off)──────────────────────────────────────────▶ NoPgo
//! Start ─(gcc | llvm+merge)─▶ Instrumented ─▶ Trained ─▶ Optimized
//!                                                   └─(no profile)─▶ Degraded
//! Start ─(llvm without merge tool | unknown)────────────────▶ Degraded
//! ```
//!
//! Missing profiling infrastructure never fails the run: every degraded path
//! still produces an aggressively optimized binary. Every terminal state
//! yields exactly one [`BuildArtifact`].

pub mod flags;
mod steps;
pub mod training;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compile::{BuildArtifact, CompileError, CompileFlags, Stage};
use crate::exec::ToolError;
use crate::probe::CompilerFamily;

pub use steps::{BuildSteps, GCC_PROFILE_EXT, LLVM_RAW_PROFILE_EXT, MakeSteps};
pub use training::{TrainingRunFailure, TrainingSummary, prepare_workload, workload_path};

const MERGED_PROFILE: &str = "merged.profdata";
const LLVM_PROFILE_PATTERN: &str = "mujs-%p.profraw";

/// Fatal errors from the controller.
#[derive(Debug, Error)]
pub enum PgoError {
  #[error(transparent)]
  Compile(#[from] CompileError),

  #[error("failed to reset profile data: {0}")]
  ResetProfiles(#[source] std::io::Error),

  #[error("failed to merge raw profiles: {0}")]
  Merge(#[source] ToolError),
}

/// Why a PGO request ended in a non-profiled optimized build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegradeReason {
  /// Clang without `llvm-profdata`; instrumentation was skipped.
  MergeToolMissing,
  /// Compiler family not recognized; instrumentation was skipped.
  UnknownCompiler,
  /// Training produced no profile data.
  ProfileMissing,
}

impl fmt::Display for DegradeReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Self::MergeToolMissing => "profile merge tool missing",
      Self::UnknownCompiler => "unknown compiler family",
      Self::ProfileMissing => "no profile data produced",
    };
    write!(f, "{}", text)
  }
}

/// How the controller finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "kebab-case")]
pub enum Terminal {
  NoPgo,
  Optimized,
  Degraded(DegradeReason),
}

impl fmt::Display for Terminal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NoPgo => write!(f, "no-pgo"),
      Self::Optimized => write!(f, "optimized"),
      Self::Degraded(reason) => write!(f, "degraded ({})", reason),
    }
  }
}

/// What the controller needs to know about this run.
#[derive(Debug, Clone)]
pub struct PgoPlan {
  pub enabled: bool,
  pub family: CompilerFamily,
  pub has_merge_tool: bool,
  pub training_runs: u32,
  pub profile_dir: PathBuf,
}

/// Result of a controller run.
#[derive(Debug, Clone, Serialize)]
pub struct PgoOutcome {
  pub terminal: Terminal,
  pub artifact: BuildArtifact,
  /// Present when training ran.
  pub training: Option<TrainingSummary>,
}

#[derive(Debug)]
enum PgoState {
  Start,
  Instrumented(BuildArtifact),
  Trained,
  Finished(Terminal, BuildArtifact),
}

/// Run the state machine to a terminal state.
pub async fn run_pgo<S: BuildSteps>(steps: &mut S, plan: &PgoPlan) -> Result<PgoOutcome, PgoError> {
  let mut state = PgoState::Start;
  let mut training = None;

  loop {
    debug!(state = ?state, "pgo state");
    state = match state {
      PgoState::Start => start(steps, plan).await?,
      PgoState::Instrumented(artifact) => {
        training = Some(train(steps, plan, &artifact).await);
        PgoState::Trained
      }
      PgoState::Trained => finish(steps, plan).await?,
      PgoState::Finished(terminal, artifact) => {
        info!(%terminal, artifact = %artifact.path.display(), "pgo finished");
        return Ok(PgoOutcome {
          terminal,
          artifact,
          training,
        });
      }
    };
  }
}

async fn start<S: BuildSteps>(steps: &mut S, plan: &PgoPlan) -> Result<PgoState, PgoError> {
  if !plan.enabled {
    let artifact = steps.compile(Stage::Baseline, &CompileFlags::default()).await?;
    return Ok(PgoState::Finished(Terminal::NoPgo, artifact));
  }

  let instrument = match plan.family {
    CompilerFamily::Gcc => flags::gcc_instrument(&plan.profile_dir),
    CompilerFamily::LlvmClang if plan.has_merge_tool => flags::llvm_instrument(),
    CompilerFamily::LlvmClang => return degrade(steps, DegradeReason::MergeToolMissing).await,
    CompilerFamily::Unknown => return degrade(steps, DegradeReason::UnknownCompiler).await,
  };

  steps.reset_profiles().map_err(PgoError::ResetProfiles)?;
  let artifact = steps.compile(Stage::Instrument, &instrument).await?;
  Ok(PgoState::Instrumented(artifact))
}

/// Run every training sample in order. Individual failures are logged and
/// never abort the run.
async fn train<S: BuildSteps>(steps: &mut S, plan: &PgoPlan, artifact: &BuildArtifact) -> TrainingSummary {
  let env = match plan.family {
    CompilerFamily::LlvmClang => vec![(
      "LLVM_PROFILE_FILE".to_string(),
      plan.profile_dir.join(LLVM_PROFILE_PATTERN).display().to_string(),
    )],
    _ => Vec::new(),
  };

  let mut summary = TrainingSummary::default();
  for sample in 1..=plan.training_runs {
    summary.attempted += 1;
    match steps.run_sample(sample, artifact, &env).await {
      Ok(()) => summary.succeeded += 1,
      Err(e) => warn!(sample, error = %e, "training sample failed, continuing"),
    }
  }

  if summary.succeeded == 0 {
    warn!(attempted = summary.attempted, "no training sample succeeded; profile data may be empty");
  } else {
    info!(attempted = summary.attempted, succeeded = summary.succeeded, "training finished");
  }
  summary
}

async fn finish<S: BuildSteps>(steps: &mut S, plan: &PgoPlan) -> Result<PgoState, PgoError> {
  match plan.family {
    CompilerFamily::Gcc => {
      if steps.gcc_profiles().is_empty() {
        warn!(dir = %plan.profile_dir.display(), "no .{} files after training", GCC_PROFILE_EXT);
        return degrade(steps, DegradeReason::ProfileMissing).await;
      }
      let artifact = steps.compile(Stage::Optimize, &flags::gcc_optimize(&plan.profile_dir)).await?;
      Ok(PgoState::Finished(Terminal::Optimized, artifact))
    }
    CompilerFamily::LlvmClang => {
      let raw = steps.raw_profiles();
      if raw.is_empty() {
        warn!("no .{} files after training", LLVM_RAW_PROFILE_EXT);
        return degrade(steps, DegradeReason::ProfileMissing).await;
      }
      let merged = plan.profile_dir.join(MERGED_PROFILE);
      info!(files = raw.len(), output = %merged.display(), "merging raw profiles");
      steps.merge_profiles(&raw, &merged).await.map_err(PgoError::Merge)?;
      let artifact = steps.compile(Stage::Optimize, &flags::llvm_optimize(&merged)).await?;
      Ok(PgoState::Finished(Terminal::Optimized, artifact))
    }
    CompilerFamily::Unknown => degrade(steps, DegradeReason::UnknownCompiler).await,
  }
}

async fn degrade<S: BuildSteps>(steps: &mut S, reason: DegradeReason) -> Result<PgoState, PgoError> {
  warn!(%reason, "building without profile guidance");
  let artifact = steps.compile(Stage::Aggressive, &flags::aggressive()).await?;
  Ok(PgoState::Finished(Terminal::Degraded(reason), artifact))
}
