//! Shallow checkouts of the pinned dependencies.
//!
//! A checkout that is missing is cloned at depth 1; one that already exists
//! is refreshed with a depth-1 fetch from its configured remote. A refresh
//! updates remote-tracking refs only; the worktree that gets built is left
//! where it is. A failed refresh is downgraded to a warning and the checkout
//! on disk is used as-is.

use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use gix::remote::Direction;
use gix::remote::fetch::Shallow;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

const DEPTH: NonZeroU32 = NonZeroU32::MIN;

/// Errors that can occur during fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
  /// Failed to create the parent of the checkout directory.
  #[error("failed to create directory '{}': {}", .0.display(), .1)]
  CreateParentDir(PathBuf, #[source] std::io::Error),

  /// Failed to clone a git repository.
  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// Failed to open an existing git repository.
  #[error("failed to open repository at '{}': {source}", .path.display())]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  /// Failed to find remote.
  #[error("no remote configured for repository")]
  NoRemote,

  /// Failed to connect to remote.
  #[error("failed to connect to remote '{url}': {source}")]
  Connect {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// Failed to fetch from remote.
  #[error("failed to fetch from '{url}': {source}")]
  Fetch {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

/// What [`ensure`] did to make the checkout available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum FetchOutcome {
  /// No checkout existed; a fresh shallow clone was made.
  Cloned,
  /// Remote-tracking refs of the existing checkout were updated. The
  /// worktree is unchanged.
  Refreshed,
  /// The refresh failed; the existing checkout is used unchanged.
  Reused { reason: String },
}

/// Make sure a checkout of `url` exists at `local_path`.
///
/// Only a failed initial clone is an error.
pub fn ensure(url: &str, local_path: &Path) -> Result<FetchOutcome, FetchError> {
  if local_path.exists() {
    debug!(url, path = %local_path.display(), "refreshing existing checkout");
    return Ok(match refresh(local_path, url) {
      Ok(()) => FetchOutcome::Refreshed,
      Err(e) => {
        warn!(path = %local_path.display(), error = %e, "refresh failed, using existing checkout");
        FetchOutcome::Reused { reason: e.to_string() }
      }
    });
  }

  if let Some(parent) = local_path.parent() {
    fs::create_dir_all(parent).map_err(|e| FetchError::CreateParentDir(parent.to_path_buf(), e))?;
  }

  info!(url, path = %local_path.display(), "cloning repository");
  if let Err(e) = clone_shallow(url, local_path) {
    // A half-written checkout would be mistaken for a usable one next run.
    if local_path.exists() {
      let _ = fs::remove_dir_all(local_path);
    }
    return Err(e);
  }

  Ok(FetchOutcome::Cloned)
}

/// Clone a git repository at depth 1 to the specified path.
fn clone_shallow(url: &str, dest: &Path) -> Result<gix::Repository, FetchError> {
  let clone_err = |e: Box<dyn std::error::Error + Send + Sync>| FetchError::Clone {
    url: url.to_string(),
    source: e,
  };

  let mut prepared = gix::prepare_clone(url, dest)
    .map_err(|e| clone_err(Box::new(e)))?
    .with_shallow(Shallow::DepthAtRemote(DEPTH));

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| clone_err(Box::new(e)))?;

  let (repo, _outcome) = checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| clone_err(Box::new(e)))?;

  Ok(repo)
}

/// Fetch updates from the default remote at depth 1.
fn refresh(path: &Path, url: &str) -> Result<(), FetchError> {
  let repo = gix::open(path).map_err(|e| FetchError::Open {
    path: path.to_path_buf(),
    source: Box::new(e),
  })?;

  let remote = repo
    .find_default_remote(Direction::Fetch)
    .ok_or(FetchError::NoRemote)?
    .map_err(|e| FetchError::Connect {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  if let Some(configured) = remote.url(Direction::Fetch).map(|u| u.to_bstring().to_string())
    && !same_url(&configured, url)
  {
    warn!(
      path = %path.display(),
      configured = %configured,
      requested = url,
      "checkout remote differs from requested url; fetching from the configured remote"
    );
  }

  let connection = remote.connect(Direction::Fetch).map_err(|e| FetchError::Connect {
    url: url.to_string(),
    source: Box::new(e),
  })?;

  connection
    .prepare_fetch(gix::progress::Discard, Default::default())
    .map_err(|e| FetchError::Fetch {
      url: url.to_string(),
      source: Box::new(e),
    })?
    .with_shallow(Shallow::DepthAtRemote(DEPTH))
    .receive(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| FetchError::Fetch {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  Ok(())
}

/// Compare remote urls, ignoring a trailing slash or `.git` suffix.
fn same_url(a: &str, b: &str) -> bool {
  fn normalize(url: &str) -> &str {
    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url)
  }
  normalize(a) == normalize(b)
}
