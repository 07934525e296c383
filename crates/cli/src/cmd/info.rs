use anyhow::{Context, Result};

use mujs_pgo_lib::config::BuildConfig;
use mujs_pgo_lib::platform::platform_triple;
use mujs_pgo_lib::probe::probe;

use crate::output::{OutputFormat, print_json, print_stat, print_success};

pub fn cmd_info(config: &BuildConfig, output: OutputFormat) -> Result<()> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let toolchain = rt.block_on(probe(config)).context("Toolchain probe failed")?;

  if output.is_json() {
    return print_json(&toolchain);
  }

  print_success("Toolchain");
  print_stat("Platform", &platform_triple().unwrap_or_else(|| "unknown".to_string()));
  print_stat("Layer", toolchain.platform_kind.as_str());
  print_stat("Compiler", &toolchain.compiler.display().to_string());
  print_stat("Family", toolchain.compiler_family.as_str());
  print_stat("Version", &toolchain.compiler_version);
  print_stat("make", &toolchain.make.display().to_string());
  if let Some(cmake) = &toolchain.cmake {
    print_stat("cmake", &cmake.display().to_string());
  }
  if config.variant.pgo() {
    let merge = toolchain
      .profile_merge_tool
      .as_ref()
      .map(|p| p.display().to_string())
      .unwrap_or_else(|| "not found".to_string());
    print_stat("llvm-profdata", &merge);
  }

  Ok(())
}
