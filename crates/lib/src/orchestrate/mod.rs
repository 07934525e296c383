//! Top-level build pipeline.
//!
//! Sequences probe → fetch → allocator → PGO controller → package for one
//! [`BuildConfig`]. Everything runs strictly in order; parallelism only exists
//! inside `make -j` and `cmake --parallel`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, Instrument};

use crate::allocator::{AllocatorBuildError, AllocatorRequest, LinkMode, build_allocator};
use crate::compile::{CompileDriver, CompileFlags};
use crate::config::{BuildConfig, ConfigError, Layout, Variant};
use crate::fetch::{self, FetchError, FetchOutcome};
use crate::package::{PackageError, PackageReport, PackageRequest, package};
use crate::pgo::{MakeSteps, PgoError, PgoOutcome, PgoPlan, prepare_workload, run_pgo, workload_path};
use crate::platform::PlatformKind;
use crate::platform::os::Os;
use crate::probe::{CompilerFamily, ProbeError, probe};

/// Any fatal failure of a run.
#[derive(Debug, Error)]
pub enum RunError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Probe(#[from] ProbeError),

  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Allocator(#[from] AllocatorBuildError),

  #[error("failed to prepare training workload: {0}")]
  Workload(#[source] std::io::Error),

  #[error(transparent)]
  Pgo(#[from] PgoError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// State of one dependency checkout after fetching.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
  pub name: &'static str,
  pub path: PathBuf,
  #[serde(flatten)]
  pub outcome: FetchOutcome,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
  pub variant: Variant,
  pub target_tag: String,
  pub platform: PlatformKind,
  pub compiler_family: CompilerFamily,
  pub compiler_version: String,
  pub link_mode: Option<LinkMode>,
  pub sources: Vec<SourceStatus>,
  pub pgo: PgoOutcome,
  pub package: PackageReport,
}

/// Run the whole pipeline for `config`.
pub async fn run(config: &BuildConfig) -> Result<RunSummary, RunError> {
  config.validate()?;
  let layout = Layout::new(config);
  info!(variant = %config.variant, work_dir = %layout.work_dir.display(), "starting build");

  let toolchain = probe(config).await?;

  let mut sources = vec![fetch_source("mujs", &config.source_repo, &layout.source_dir).await?];

  let mut allocator = None;
  if config.variant.allocator() {
    sources.push(fetch_source("mimalloc", &config.allocator_repo, &layout.allocator_source_dir).await?);

    // cmake is resolved by the prober whenever the allocator is requested.
    let cmake = toolchain.cmake.as_deref().ok_or(ProbeError::MissingTool {
      tool: "cmake".to_string(),
      purpose: "mimalloc configuration",
    })?;
    let request = AllocatorRequest {
      cmake,
      compiler: &toolchain.compiler,
      source_dir: &layout.allocator_source_dir,
      build_dir: &layout.allocator_build_dir,
      prefix: &layout.allocator_prefix,
      jobs: config.jobs,
    };
    let location = build_allocator(&request).instrument(info_span!("mimalloc")).await?;
    let mode = LinkMode::select(config.static_allocator, toolchain.platform_kind);
    info!(mode = %mode, lib_dir = %location.lib_dir.display(), "mimalloc ready");
    allocator = Some((location, mode));
  }

  let extra = match &allocator {
    Some((location, mode)) => location.flags(*mode, toolchain.platform_kind)?,
    None => CompileFlags::default(),
  };

  let training_script = if config.variant.pgo() {
    prepare_workload(&layout.training_dir, config.training_script.as_deref()).map_err(RunError::Workload)?
  } else {
    workload_path(&layout.training_dir)
  };

  let mut steps = MakeSteps {
    driver: CompileDriver {
      make: toolchain.make.clone(),
      compiler: toolchain.compiler.clone(),
      source_dir: layout.source_dir.clone(),
      jobs: config.jobs,
      platform: toolchain.platform_kind,
      extra,
    },
    merge_tool: toolchain.profile_merge_tool.clone(),
    work_dir: layout.work_dir.clone(),
    profile_dir: layout.profile_dir.clone(),
    training_dir: layout.training_dir.clone(),
    training_script,
  };
  let plan = PgoPlan {
    enabled: config.variant.pgo(),
    family: toolchain.compiler_family,
    has_merge_tool: toolchain.has_profile_merge_tool(),
    training_runs: config.training_runs,
    profile_dir: layout.profile_dir.clone(),
  };
  let pgo = run_pgo(&mut steps, &plan).instrument(info_span!("pgo")).await?;

  let report = package(&PackageRequest {
    artifact: &pgo.artifact,
    output_dir: &layout.output_dir,
    variant: config.variant,
    platform: toolchain.platform_kind,
    os: Os::current().unwrap_or(Os::Linux),
    allocator: allocator.as_ref().map(|(location, mode)| (location, *mode)),
    archive_path: config.archive.then_some(layout.archive_path.as_path()),
  })?;

  info!(output = %report.output_dir.display(), terminal = %pgo.terminal, "build complete");

  Ok(RunSummary {
    variant: config.variant,
    target_tag: config.resolved_tag(),
    platform: toolchain.platform_kind,
    compiler_family: toolchain.compiler_family,
    compiler_version: toolchain.compiler_version,
    link_mode: allocator.as_ref().map(|(_, mode)| *mode),
    sources,
    pgo,
    package: report,
  })
}

/// Clone or refresh one checkout on the blocking pool.
async fn fetch_source(name: &'static str, url: &str, path: &Path) -> Result<SourceStatus, RunError> {
  let (url, target) = (url.to_string(), path.to_path_buf());
  let outcome = tokio::task::spawn_blocking(move || fetch::ensure(&url, &target)).await??;
  info!(source = name, outcome = ?outcome, "source ready");
  Ok(SourceStatus {
    name,
    path: path.to_path_buf(),
    outcome,
  })
}
