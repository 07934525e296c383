use std::ffi::OsString;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::consts::{
  BASE_NAME, DEFAULT_ALLOCATOR_REPO, DEFAULT_COMPILER, DEFAULT_SOURCE_REPO, DEFAULT_TRAINING_RUNS, MIN_TRAINING_RUNS,
};
use crate::platform::platform_triple;

/// Errors from validating a [`BuildConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("training runs must be at least {MIN_TRAINING_RUNS}, got {0}")]
  TooFewTrainingRuns(u32),

  #[error("work directory must be absolute: {}", .0.display())]
  RelativeWorkDir(PathBuf),

  #[error("target tag must not contain path separators: {0}")]
  InvalidTargetTag(String),

  #[error("training script not found: {}", .0.display())]
  TrainingScriptNotFound(PathBuf),
}

/// Which optional stages a build includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
  #[default]
  Plain,
  Pgo,
  Mimalloc,
  PgoMimalloc,
}

impl Variant {
  pub fn from_flags(pgo: bool, allocator: bool) -> Self {
    match (pgo, allocator) {
      (false, false) => Self::Plain,
      (true, false) => Self::Pgo,
      (false, true) => Self::Mimalloc,
      (true, true) => Self::PgoMimalloc,
    }
  }

  pub fn pgo(&self) -> bool {
    matches!(self, Self::Pgo | Self::PgoMimalloc)
  }

  pub fn allocator(&self) -> bool {
    matches!(self, Self::Mimalloc | Self::PgoMimalloc)
  }

  /// Suffix shared by the output directory, executable and archive names.
  pub fn suffix(&self) -> &'static str {
    match self {
      Self::Plain => "",
      Self::Pgo => "-pgo",
      Self::Mimalloc => "-mimalloc",
      Self::PgoMimalloc => "-pgo-mimalloc",
    }
  }

  /// Executable name without platform suffix, e.g. `mujs-pgo`.
  pub fn binary_stem(&self) -> String {
    format!("{}{}", BASE_NAME, self.suffix())
  }
}

impl fmt::Display for Variant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Plain => "plain",
      Self::Pgo => "pgo",
      Self::Mimalloc => "mimalloc",
      Self::PgoMimalloc => "pgo-mimalloc",
    };
    write!(f, "{}", name)
  }
}

/// Immutable snapshot of all options for one run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
  pub variant: Variant,
  pub jobs: NonZeroUsize,
  /// Compiler name or path, resolved against `tool_path` by the prober.
  pub compiler: String,
  pub source_repo: String,
  pub allocator_repo: String,
  /// Free-form tag naming the archive; defaults to the platform triple.
  pub target_tag: Option<String>,
  pub training_runs: u32,
  /// Replaces the built-in training workload when set.
  pub training_script: Option<PathBuf>,
  /// Link mimalloc into the binary instead of shipping a preload wrapper.
  pub static_allocator: bool,
  pub archive: bool,
  /// Absolute root for checkouts, build products and output.
  pub work_dir: PathBuf,
  /// Search path for external tools; `None` means the process `PATH`.
  pub tool_path: Option<OsString>,
}

impl BuildConfig {
  /// Configuration with every option at its default, rooted at `work_dir`.
  pub fn new(work_dir: PathBuf) -> Self {
    Self {
      variant: Variant::default(),
      jobs: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
      compiler: DEFAULT_COMPILER.to_string(),
      source_repo: DEFAULT_SOURCE_REPO.to_string(),
      allocator_repo: DEFAULT_ALLOCATOR_REPO.to_string(),
      target_tag: None,
      training_runs: DEFAULT_TRAINING_RUNS,
      training_script: None,
      static_allocator: false,
      archive: false,
      work_dir,
      tool_path: None,
    }
  }

  /// Check cross-field constraints that the types alone cannot express.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.training_runs < MIN_TRAINING_RUNS {
      return Err(ConfigError::TooFewTrainingRuns(self.training_runs));
    }
    if !self.work_dir.is_absolute() {
      return Err(ConfigError::RelativeWorkDir(self.work_dir.clone()));
    }
    if let Some(tag) = self.target_tag.as_ref().filter(|t| t.is_empty() || t.contains(['/', '\\'])) {
      return Err(ConfigError::InvalidTargetTag(tag.clone()));
    }
    if let Some(script) = self.training_script.as_ref().filter(|s| !s.is_file()) {
      return Err(ConfigError::TrainingScriptNotFound(script.clone()));
    }
    Ok(())
  }

  /// The target tag, falling back to the host platform triple.
  pub fn resolved_tag(&self) -> String {
    self
      .target_tag
      .clone()
      .or_else(platform_triple)
      .unwrap_or_else(|| "unknown".to_string())
  }

  /// Tool search path, falling back to the process `PATH`.
  pub fn search_path(&self) -> Option<OsString> {
    self.tool_path.clone().or_else(|| std::env::var_os("PATH"))
  }
}
