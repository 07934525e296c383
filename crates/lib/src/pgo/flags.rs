//! Stage flags per compiler family.

use std::path::Path;

use crate::compile::CompileFlags;

fn native_tuning() -> CompileFlags {
  CompileFlags::default().cflag("-march=native")
}

/// GCC instrumentation: counters land in `profile_dir` as `.gcda` files.
pub fn gcc_instrument(profile_dir: &Path) -> CompileFlags {
  let generate = format!("-fprofile-generate={}", profile_dir.display());
  native_tuning().cflag("-g").both(generate)
}

/// GCC optimized build consuming the counters in `profile_dir`.
///
/// `-fprofile-correction` lets the compiler accept counters that disagree
/// slightly with the optimized control flow.
pub fn gcc_optimize(profile_dir: &Path) -> CompileFlags {
  let use_dir = format!("-fprofile-use={}", profile_dir.display());
  CompileFlags::default()
    .cflag(use_dir.clone())
    .cflag("-fprofile-correction")
    .cflag("-O3")
    .merge(&native_tuning())
    .both("-flto")
    .ldflag(use_dir)
}

/// Clang instrumentation: each run writes a `.profraw` file.
pub fn llvm_instrument() -> CompileFlags {
  CompileFlags::default()
    .both("-fprofile-instr-generate")
    .cflag("-fcoverage-mapping")
    .merge(&native_tuning())
    .cflag("-g")
}

/// Clang optimized build consuming a merged `.profdata` file.
pub fn llvm_optimize(profdata: &Path) -> CompileFlags {
  CompileFlags::default()
    .both(format!("-fprofile-instr-use={}", profdata.display()))
    .cflag("-O3")
    .merge(&native_tuning())
    .both("-flto")
}

/// Best non-profiled build, used whenever profiling is unavailable.
pub fn aggressive() -> CompileFlags {
  CompileFlags::default()
    .cflag("-O3")
    .merge(&native_tuning())
    .both("-flto")
    .cflag("-funroll-loops")
}
