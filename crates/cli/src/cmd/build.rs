//! The default command: run the whole build pipeline.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use mujs_pgo_lib::config::BuildConfig;
use mujs_pgo_lib::fetch::FetchOutcome;
use mujs_pgo_lib::orchestrate::{RunSummary, run};
use mujs_pgo_lib::pgo::Terminal;

use crate::output::{
  OutputFormat, format_bytes, format_duration, print_info, print_json, print_stat, print_success, print_warning, symbols,
};

pub fn cmd_build(config: &BuildConfig, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  debug!(?config, "resolved configuration");
  std::fs::create_dir_all(&config.work_dir)
    .with_context(|| format!("Failed to create work directory {}", config.work_dir.display()))?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let summary = rt.block_on(run(config)).context("Build failed")?;

  if output.is_json() {
    print_json(&summary)?;
  } else {
    print_summary(&summary);
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  Ok(())
}

fn print_summary(summary: &RunSummary) {
  if let Terminal::Degraded(reason) = summary.pgo.terminal {
    print_warning(&format!("Profile-guided optimization skipped: {}", reason));
  }
  if let Some(training) = summary.pgo.training.filter(|t| t.failed() > 0) {
    print_warning(&format!(
      "{} of {} training runs failed",
      training.failed(),
      training.attempted
    ));
  }
  for source in &summary.sources {
    if let FetchOutcome::Reused { reason } = &source.outcome {
      print_warning(&format!("Using existing {} checkout ({})", source.name, reason));
    }
  }

  println!();
  print_success(&format!("Built {} ({})", summary.variant, summary.pgo.terminal));
  print_stat("Target", &summary.target_tag);
  print_stat("Platform", summary.platform.as_str());
  print_stat(
    "Compiler",
    &format!("{} {} {}", summary.compiler_family, symbols::ARROW, summary.compiler_version),
  );
  if let Some(training) = summary.pgo.training {
    print_stat(
      "Training",
      &format!("{}/{} runs succeeded", training.succeeded, training.attempted),
    );
  }
  if let Some(mode) = summary.link_mode {
    print_stat("Allocator", &format!("mimalloc ({})", mode));
  }
  print_stat("Executable", &summary.package.executable.display().to_string());
  if let Some(wrapper) = &summary.package.wrapper {
    print_stat("Wrapper", &wrapper.display().to_string());
  }
  match &summary.package.archive {
    Some(archive) => print_stat(
      "Archive",
      &format!("{} ({})", archive.path.display(), format_bytes(archive.bytes)),
    ),
    None => print_info("No archive requested (use -z to create one)"),
  }
}
