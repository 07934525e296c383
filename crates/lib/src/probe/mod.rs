//! Environment probing.
//!
//! Resolves the external tools a run needs, classifies the compiler, and
//! decides which platform layer the build runs under. The result is an
//! immutable [`ToolchainInfo`] computed once per run.

mod compiler;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::exec::{ToolCommand, ToolError};
use crate::platform::PlatformKind;

pub use compiler::{CompilerFamily, classify_compiler};

const MERGE_TOOL: &str = "llvm-profdata";

/// Errors that abort a run before any build starts.
#[derive(Debug, Error)]
pub enum ProbeError {
  #[error("required tool '{tool}' not found in PATH ({purpose})")]
  MissingTool { tool: String, purpose: &'static str },

  #[error("failed to query compiler version: {0}")]
  VersionQuery(#[source] ToolError),
}

/// Detected host toolchain.
#[derive(Debug, Clone, Serialize)]
pub struct ToolchainInfo {
  pub platform_kind: PlatformKind,
  pub compiler_family: CompilerFamily,
  pub compiler: PathBuf,
  /// First line of the compiler's `--version` output.
  pub compiler_version: String,
  pub make: PathBuf,
  /// Present when the allocator was requested.
  pub cmake: Option<PathBuf>,
  /// Present only for LLVM-family compilers with PGO requested.
  pub profile_merge_tool: Option<PathBuf>,
}

impl ToolchainInfo {
  pub fn has_profile_merge_tool(&self) -> bool {
    self.profile_merge_tool.is_some()
  }
}

/// Probe the host for everything `config` needs.
///
/// Missing `make`, compiler, or (with the allocator) `cmake` is fatal. A
/// missing `llvm-profdata` is not: it leaves `profile_merge_tool` empty and the
/// PGO controller degrades to a non-profiled optimized build.
pub async fn probe(config: &BuildConfig) -> Result<ToolchainInfo, ProbeError> {
  let search = config.search_path();
  let resolve = |name: &str, purpose: &'static str| {
    find_tool(name, search.as_ref(), &config.work_dir).ok_or_else(|| ProbeError::MissingTool {
      tool: name.to_string(),
      purpose,
    })
  };

  let platform_kind = PlatformKind::detect();
  let make = resolve("make", "build driver")?;
  let compiler = resolve(&config.compiler, "C compiler")?;
  let cmake = if config.variant.allocator() {
    Some(resolve("cmake", "mimalloc configuration")?)
  } else {
    None
  };

  let output = ToolCommand::new(&compiler)
    .arg("--version")
    .output()
    .await
    .map_err(ProbeError::VersionQuery)?;
  let banner = format!("{}\n{}", output.stdout, output.stderr);
  let compiler_family = classify_compiler(&banner);
  let compiler_version = banner.trim().lines().next().unwrap_or_default().to_string();
  if !output.success() {
    warn!(compiler = %compiler.display(), code = ?output.code, "compiler version query exited unsuccessfully");
  }

  let profile_merge_tool = if config.variant.pgo() && compiler_family == CompilerFamily::LlvmClang {
    let found = find_merge_tool(&compiler, search.as_ref(), &config.work_dir);
    if found.is_none() {
      warn!("{} not found; PGO will fall back to an optimized build without profiling", MERGE_TOOL);
    }
    found
  } else {
    None
  };

  info!(
    platform = %platform_kind,
    family = %compiler_family,
    compiler = %compiler.display(),
    "probed toolchain"
  );

  Ok(ToolchainInfo {
    platform_kind,
    compiler_family,
    compiler,
    compiler_version,
    make,
    cmake,
    profile_merge_tool,
  })
}

fn find_tool(name: &str, search: Option<&OsString>, cwd: &Path) -> Option<PathBuf> {
  let found = which::which_in(name, search, cwd).ok();
  debug!(tool = name, found = ?found, "tool lookup");
  found
}

/// Candidate names for the merge tool, most specific first.
///
/// `LLVM_PROFDATA` wins; a versioned compiler such as `clang-17` suggests
/// `llvm-profdata-17`; the unversioned name comes last.
fn merge_tool_candidates(compiler: &Path, override_var: Option<String>) -> Vec<String> {
  let mut candidates = Vec::new();
  if let Some(explicit) = override_var.filter(|v| !v.is_empty()) {
    candidates.push(explicit);
  }

  let stem = compiler.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
  let version = stem
    .rsplit_once('-')
    .map(|(_, v)| v)
    .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit() || c == '.'));
  if let Some(version) = version {
    candidates.push(format!("{}-{}", MERGE_TOOL, version));
  }

  candidates.push(MERGE_TOOL.to_string());
  candidates
}

fn find_merge_tool(compiler: &Path, search: Option<&OsString>, cwd: &Path) -> Option<PathBuf> {
  merge_tool_candidates(compiler, std::env::var("LLVM_PROFDATA").ok())
    .iter()
    .find_map(|name| find_tool(name, search, cwd))
}
