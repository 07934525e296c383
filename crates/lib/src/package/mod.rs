//! Output packaging.
//!
//! Lays out the final output directory for one variant: the executable, and
//! for preload-linked allocator builds the shared library plus a loader
//! wrapper. Optionally compresses the directory into a `.tar.gz`.

mod archive;

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::allocator::{LibraryLocation, LinkMode};
use crate::compile::BuildArtifact;
use crate::config::Variant;
use crate::consts::APP_NAME;
use crate::platform::PlatformKind;
use crate::platform::os::Os;
use crate::util::fs::{make_executable, recreate_dir};

pub use archive::{list_entries, write_tar_gz};

/// Errors from packaging. Always fatal.
#[derive(Debug, Error)]
pub enum PackageError {
  #[error("failed to prepare output directory {}: {source}", .path.display())]
  OutputDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("mimalloc install has no shared library to preload")]
  MissingSharedLibrary,

  #[error("no preload mechanism on {0}; use static linking")]
  PreloadUnsupported(String),

  #[error("failed to write wrapper {}: {source}", .path.display())]
  Wrapper {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write archive {}: {source}", .path.display())]
  Archive {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Inputs to [`package`].
#[derive(Debug, Clone)]
pub struct PackageRequest<'a> {
  pub artifact: &'a BuildArtifact,
  pub output_dir: &'a Path,
  pub variant: Variant,
  pub platform: PlatformKind,
  /// Host OS; selects the loader preload variable.
  pub os: Os,
  /// Set when the allocator was built for this run.
  pub allocator: Option<(&'a LibraryLocation, LinkMode)>,
  /// Set when an archive was requested.
  pub archive_path: Option<&'a Path>,
}

/// A written archive and its size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveInfo {
  pub path: PathBuf,
  pub bytes: u64,
}

/// What ended up on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
  pub output_dir: PathBuf,
  pub executable: PathBuf,
  pub wrapper: Option<PathBuf>,
  pub archive: Option<ArchiveInfo>,
}

/// Name of the packaged executable, e.g. `mujs-pgo` or `mujs-pgo.exe`.
pub fn executable_name(variant: Variant, platform: PlatformKind) -> String {
  format!("{}{}", variant.binary_stem(), platform.exe_suffix())
}

/// Replace `output_dir` with a fresh package of `artifact`.
pub fn package(request: &PackageRequest<'_>) -> Result<PackageReport, PackageError> {
  let out = request.output_dir;
  recreate_dir(out).map_err(|source| PackageError::OutputDir {
    path: out.to_path_buf(),
    source,
  })?;

  let exe_name = executable_name(request.variant, request.platform);
  let executable = out.join(&exe_name);
  copy(&request.artifact.path, &executable)?;
  make_executable(&executable).map_err(|source| PackageError::Copy {
    from: request.artifact.path.clone(),
    to: executable.clone(),
    source,
  })?;
  info!(path = %executable.display(), "packaged executable");

  let wrapper = match request.allocator {
    Some((location, LinkMode::Preload)) => Some(write_preload_wrapper(out, &exe_name, location, request.os)?),
    _ => None,
  };

  let archive = match request.archive_path {
    Some(path) => {
      let root = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(".tar.gz"))
        .unwrap_or(exe_name.as_str());
      let bytes = write_tar_gz(out, root, path).map_err(|source| PackageError::Archive {
        path: path.to_path_buf(),
        source,
      })?;
      info!(path = %path.display(), bytes, "wrote archive");
      Some(ArchiveInfo {
        path: path.to_path_buf(),
        bytes,
      })
    }
    None => None,
  };

  Ok(PackageReport {
    output_dir: out.to_path_buf(),
    executable,
    wrapper,
    archive,
  })
}

fn copy(from: &Path, to: &Path) -> Result<(), PackageError> {
  std::fs::copy(from, to).map(|_| ()).map_err(|source| PackageError::Copy {
    from: from.to_path_buf(),
    to: to.to_path_buf(),
    source,
  })
}

/// Copy the shared allocator next to the executable and write `<exe>.sh`.
fn write_preload_wrapper(
  out: &Path,
  exe_name: &str,
  location: &LibraryLocation,
  os: Os,
) -> Result<PathBuf, PackageError> {
  let var = os
    .preload_var()
    .ok_or_else(|| PackageError::PreloadUnsupported(os.to_string()))?;
  let shared = location.shared_lib.as_ref().ok_or(PackageError::MissingSharedLibrary)?;
  let lib_name = shared
    .file_name()
    .and_then(|n| n.to_str())
    .ok_or(PackageError::MissingSharedLibrary)?;
  copy(shared, &out.join(lib_name))?;

  let path = out.join(format!("{}.sh", exe_name));
  std::fs::write(&path, wrapper_script(var, lib_name, exe_name))
    .and_then(|()| make_executable(&path))
    .map_err(|source| PackageError::Wrapper {
      path: path.clone(),
      source,
    })?;

  info!(path = %path.display(), var, "wrote preload wrapper");
  Ok(path)
}

fn wrapper_script(var: &str, lib_name: &str, exe_name: &str) -> String {
  format!(
    r#"#!/bin/sh
# Generated by {app}. Runs {exe} with mimalloc preloaded.
here="$(cd "$(dirname "$0")" && pwd)"
{var}="$here/{lib}${{{var}:+:${var}}}"
export {var}
exec "$here/{exe}" "$@"
"#,
    app = APP_NAME,
    exe = exe_name,
    lib = lib_name,
    var = var,
  )
}
