//! mimalloc build and link configuration.
//!
//! The allocator is configured out of tree with CMake, built with a bounded
//! job count and installed to a private prefix. Once explicitly requested,
//! any failure here is fatal.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

use crate::compile::CompileFlags;
use crate::exec::{ToolCommand, ToolError};
use crate::platform::PlatformKind;
use crate::platform::os::Os;

/// Errors from building the allocator.
#[derive(Debug, Error)]
pub enum AllocatorBuildError {
  #[error("mimalloc {stage} step failed: {source}")]
  Stage {
    stage: &'static str,
    #[source]
    source: ToolError,
  },

  #[error("mimalloc install at {} is missing {what}", .prefix.display())]
  MissingOutput { prefix: PathBuf, what: &'static str },
}

/// How the allocator reaches the final binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMode {
  /// The override object is linked into the executable.
  Static,
  /// The shared library is injected at startup by a wrapper script.
  Preload,
}

impl LinkMode {
  /// Static linking is forced where the loader has no preload mechanism.
  pub fn select(static_requested: bool, platform: PlatformKind) -> Self {
    if static_requested || platform == PlatformKind::WindowsCompatLayer {
      Self::Static
    } else {
      Self::Preload
    }
  }
}

impl fmt::Display for LinkMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Static => write!(f, "static"),
      Self::Preload => write!(f, "preload"),
    }
  }
}

/// Inputs to [`build_allocator`].
#[derive(Debug, Clone)]
pub struct AllocatorRequest<'a> {
  pub cmake: &'a Path,
  pub compiler: &'a Path,
  pub source_dir: &'a Path,
  pub build_dir: &'a Path,
  pub prefix: &'a Path,
  pub jobs: NonZeroUsize,
}

/// Where the installed allocator lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryLocation {
  pub prefix: PathBuf,
  pub include_dir: PathBuf,
  pub lib_dir: PathBuf,
  pub shared_lib: Option<PathBuf>,
  pub static_object: Option<PathBuf>,
}

impl LibraryLocation {
  /// Compile and link flags to fold into every build of this run.
  pub fn flags(&self, mode: LinkMode, platform: PlatformKind) -> Result<CompileFlags, AllocatorBuildError> {
    let mut flags = CompileFlags::default()
      .cflag(format!("-I{}", self.include_dir.display()))
      .ldflag(format!("-L{}", self.lib_dir.display()));

    if mode == LinkMode::Static {
      let object = self.static_object.as_ref().ok_or_else(|| AllocatorBuildError::MissingOutput {
        prefix: self.prefix.clone(),
        what: "the static override object (mimalloc.o)",
      })?;
      flags = flags.ldflag(object.display().to_string());
      if platform == PlatformKind::PosixLike {
        flags = flags.ldflag("-lpthread");
      }
    }

    Ok(flags)
  }
}

/// Configure, build, and install mimalloc, then locate the installed files.
pub async fn build_allocator(request: &AllocatorRequest<'_>) -> Result<LibraryLocation, AllocatorBuildError> {
  info!(source = %request.source_dir.display(), prefix = %request.prefix.display(), "building mimalloc");

  ToolCommand::new(request.cmake)
    .arg("-S")
    .arg(request.source_dir)
    .arg("-B")
    .arg(request.build_dir)
    .args([
      "-DCMAKE_BUILD_TYPE=Release",
      "-DCMAKE_POSITION_INDEPENDENT_CODE=ON",
      "-DMI_BUILD_TESTS=OFF",
    ])
    .arg(format!("-DCMAKE_INSTALL_PREFIX={}", request.prefix.display()))
    .arg(format!("-DCMAKE_C_COMPILER={}", request.compiler.display()))
    .run()
    .await
    .map_err(|source| AllocatorBuildError::Stage {
      stage: "configure",
      source,
    })?;

  ToolCommand::new(request.cmake)
    .arg("--build")
    .arg(request.build_dir)
    .arg("--parallel")
    .arg(request.jobs.to_string())
    .run()
    .await
    .map_err(|source| AllocatorBuildError::Stage { stage: "build", source })?;

  ToolCommand::new(request.cmake)
    .arg("--install")
    .arg(request.build_dir)
    .run()
    .await
    .map_err(|source| AllocatorBuildError::Stage {
      stage: "install",
      source,
    })?;

  locate_install(request.prefix)
}

/// Find headers and libraries under an install prefix.
///
/// mimalloc installs into versioned subdirectories on some releases
/// (`lib/mimalloc-2.1/`), so the prefix is searched rather than assumed.
pub fn locate_install(prefix: &Path) -> Result<LibraryLocation, AllocatorBuildError> {
  let missing = |what| AllocatorBuildError::MissingOutput {
    prefix: prefix.to_path_buf(),
    what,
  };

  let files: Vec<PathBuf> = WalkDir::new(prefix)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| e.file_type().is_file() || e.file_type().is_symlink())
    .map(|e| e.into_path())
    .collect();
  let named = |name: &str| files.iter().find(|p| p.file_name().is_some_and(|n| n == name)).cloned();

  let header = named("mimalloc.h").ok_or_else(|| missing("mimalloc.h"))?;
  let include_dir = header.parent().map(Path::to_path_buf).ok_or_else(|| missing("an include directory"))?;

  let shared_lib = shared_lib_names().iter().find_map(|name| named(name));
  let static_object = named("mimalloc.o").or_else(|| named("mimalloc.obj"));
  let static_lib = named("libmimalloc.a").or_else(|| named("mimalloc.lib"));

  let lib_dir = shared_lib
    .as_ref()
    .or(static_lib.as_ref())
    .or(static_object.as_ref())
    .and_then(|p| p.parent())
    .map(Path::to_path_buf)
    .ok_or_else(|| missing("a library"))?;

  Ok(LibraryLocation {
    prefix: prefix.to_path_buf(),
    include_dir,
    lib_dir,
    shared_lib,
    static_object,
  })
}

fn shared_lib_names() -> Vec<String> {
  let ext = Os::current().unwrap_or(Os::Linux).shared_lib_ext();
  vec![format!("libmimalloc.{}", ext), format!("mimalloc.{}", ext)]
}
