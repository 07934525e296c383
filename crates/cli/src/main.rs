mod cmd;
mod output;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use mujs_pgo_lib::config::{BuildConfig, Variant};
use mujs_pgo_lib::consts::{
  DEFAULT_ALLOCATOR_REPO, DEFAULT_COMPILER, DEFAULT_SOURCE_REPO, DEFAULT_TRAINING_RUNS, MIN_TRAINING_RUNS,
};

use crate::cmd::{cmd_build, cmd_info};
use crate::output::{OutputFormat, print_error};

/// Build mujs with optional profile-guided optimization and mimalloc
#[derive(Parser)]
#[command(name = "mujs-pgo")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").args(["plain", "pgo", "mimalloc", "pgo_mimalloc"])))]
struct Cli {
  /// Plain optimized build (default)
  #[arg(long)]
  plain: bool,

  /// Instrument, train, and rebuild with the collected profile
  #[arg(long)]
  pgo: bool,

  /// Build and link the mimalloc allocator
  #[arg(long)]
  mimalloc: bool,

  /// PGO build linked against mimalloc
  #[arg(long)]
  pgo_mimalloc: bool,

  /// Target tag used in the archive name (default: platform triple)
  target: Option<String>,

  /// mujs repository URL
  #[arg(long, default_value = DEFAULT_SOURCE_REPO)]
  repo: String,

  /// mimalloc repository URL
  #[arg(long, default_value = DEFAULT_ALLOCATOR_REPO)]
  mimalloc_repo: String,

  /// Parallel build jobs (default: available parallelism)
  #[arg(short, long, env = "JOBS")]
  jobs: Option<NonZeroUsize>,

  /// C compiler
  #[arg(long, env = "CC", default_value = DEFAULT_COMPILER)]
  cc: String,

  /// Number of training executions
  #[arg(
    long,
    default_value_t = DEFAULT_TRAINING_RUNS,
    value_parser = clap::value_parser!(u32).range(MIN_TRAINING_RUNS as i64..)
  )]
  training_runs: u32,

  /// JavaScript file to train with instead of the built-in workload
  #[arg(long)]
  training_script: Option<PathBuf>,

  /// Link mimalloc statically instead of shipping a preload wrapper
  #[arg(long)]
  static_mimalloc: bool,

  /// Also produce a .tar.gz archive of the output directory
  #[arg(short = 'z', long)]
  archive: bool,

  /// Working directory for checkouts and output (default: current directory)
  #[arg(short = 'C', long)]
  work_dir: Option<PathBuf>,

  /// Print detected platform and toolchain, then exit
  #[arg(long)]
  info: bool,

  /// Summary output format
  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,
}

impl Cli {
  fn variant(&self) -> Variant {
    if self.plain {
      return Variant::Plain;
    }
    if self.pgo_mimalloc {
      return Variant::PgoMimalloc;
    }
    Variant::from_flags(self.pgo, self.mimalloc)
  }

  /// Turn parsed flags into an immutable [`BuildConfig`].
  fn build_config(&self) -> Result<BuildConfig> {
    let work_dir = match &self.work_dir {
      Some(dir) => dir.clone(),
      None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let work_dir = resolve_work_dir(&work_dir)?;

    let training_script = self
      .training_script
      .as_ref()
      .map(|script| {
        dunce::canonicalize(script).with_context(|| format!("Training script not found: {}", script.display()))
      })
      .transpose()?;

    let defaults = BuildConfig::new(work_dir);
    Ok(BuildConfig {
      variant: self.variant(),
      jobs: self.jobs.unwrap_or(defaults.jobs),
      compiler: self.cc.clone(),
      source_repo: self.repo.clone(),
      allocator_repo: self.mimalloc_repo.clone(),
      target_tag: self.target.clone(),
      training_runs: self.training_runs,
      training_script,
      static_allocator: self.static_mimalloc,
      archive: self.archive,
      ..defaults
    })
  }
}

/// Absolute form of `dir`. A directory that does not exist yet is left for
/// the build to create.
fn resolve_work_dir(dir: &Path) -> Result<PathBuf> {
  if dir.exists() {
    dunce::canonicalize(dir).with_context(|| format!("Failed to resolve work directory {}", dir.display()))
  } else {
    std::path::absolute(dir).with_context(|| format!("Failed to resolve work directory {}", dir.display()))
  }
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result = cli.build_config().and_then(|config| {
    if cli.info {
      cmd_info(&config, cli.format)
    } else {
      cmd_build(&config, cli.format)
    }
  });

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
