use std::path::PathBuf;

use crate::config::BuildConfig;
use crate::consts::BASE_NAME;

/// Absolute locations used by a run, derived once from a [`BuildConfig`].
///
/// Checkouts persist across runs; the output directory is recreated by every
/// run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
  pub work_dir: PathBuf,
  pub source_dir: PathBuf,
  pub allocator_source_dir: PathBuf,
  pub allocator_build_dir: PathBuf,
  pub allocator_prefix: PathBuf,
  pub profile_dir: PathBuf,
  pub training_dir: PathBuf,
  pub output_dir: PathBuf,
  pub archive_path: PathBuf,
}

impl Layout {
  pub fn new(config: &BuildConfig) -> Self {
    let work = &config.work_dir;
    let suffix = config.variant.suffix();

    Self {
      work_dir: work.clone(),
      source_dir: work.join(BASE_NAME),
      allocator_source_dir: work.join("mimalloc"),
      allocator_build_dir: work.join("mimalloc-build"),
      allocator_prefix: work.join("mimalloc-install"),
      profile_dir: work.join("pgo-profile"),
      training_dir: work.join("pgo-training"),
      output_dir: work.join(format!("dist{}", suffix)),
      archive_path: work.join(archive_name(config)),
    }
  }
}

/// File name of the compressed output, e.g. `mujs-pgo-x86_64-linux.tar.gz`.
pub fn archive_name(config: &BuildConfig) -> String {
  format!("{}-{}.tar.gz", config.variant.binary_stem(), config.resolved_tag())
}
