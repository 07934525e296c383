//! Training workload and sample bookkeeping.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Built-in JavaScript program run by every training sample.
pub const WORKLOAD_JS: &str = include_str!("workload.js");

const WORKLOAD_FILE: &str = "workload.js";

/// A single training execution that did not finish cleanly.
#[derive(Debug, Error)]
#[error("training sample {sample} failed: {reason}")]
pub struct TrainingRunFailure {
  pub sample: u32,
  pub reason: String,
}

/// Counts from the training phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrainingSummary {
  pub attempted: u32,
  pub succeeded: u32,
}

impl TrainingSummary {
  pub fn failed(&self) -> u32 {
    self.attempted - self.succeeded
  }
}

/// Where the built-in workload is written under `training_dir`.
pub fn workload_path(training_dir: &Path) -> PathBuf {
  training_dir.join(WORKLOAD_FILE)
}

/// Return the script to train with: `custom` if given, otherwise the built-in
/// workload written into `training_dir`.
pub fn prepare_workload(training_dir: &Path, custom: Option<&Path>) -> io::Result<PathBuf> {
  if let Some(script) = custom {
    return Ok(script.to_path_buf());
  }
  std::fs::create_dir_all(training_dir)?;
  let path = workload_path(training_dir);
  std::fs::write(&path, WORKLOAD_JS)?;
  Ok(path)
}
