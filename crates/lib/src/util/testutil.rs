//! Test utilities for mujs-pgo-lib.
//!
//! Cross-platform shell helpers and writers for fake build tools, so tests can
//! exercise the pipeline without a real compiler.

use std::path::{Path, PathBuf};

/// Returns the shell binary and args to run a script.
#[cfg(unix)]
pub fn shell(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Write an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  let path = dir.join(name);
  std::fs::write(&path, format!("#!/bin/sh\nPATH=/usr/bin:/bin\n{}\n", body)).unwrap();
  crate::util::fs::make_executable(&path).unwrap();
  path
}

/// A compiler that answers `--version` with `banner`.
#[cfg(unix)]
pub fn fake_compiler(dir: &Path, name: &str, banner: &str) -> PathBuf {
  write_script(
    dir,
    name,
    &format!("if [ \"$1\" = \"--version\" ]; then\n  printf '%s\\n' '{}'\n  exit 0\nfi\nexit 1", banner),
  )
}

/// A `make` that logs each invocation to `make.log` in its working directory
/// and, for non-clean targets, writes `build/release/mujs` as a script that
/// appends its arguments to `runs.log` next to `make.log`.
///
/// The generated binary mimics instrumented builds: with
/// `-fprofile-generate=<dir>` in `CFLAGS` it drops `<dir>/mujs.gcda`, and with
/// `-fprofile-instr-generate` it writes the file named by `LLVM_PROFILE_FILE`.
#[cfg(unix)]
pub fn fake_make(dir: &Path) -> PathBuf {
  write_script(
    dir,
    "make",
    r##"echo "$*" >> make.log
cflags=""
for arg in "$@"; do
  case "$arg" in
    clean) rm -rf build; exit 0;;
    CFLAGS=*) cflags="${arg#CFLAGS=}";;
  esac
done
gcda_dir=""
instr=no
for f in $cflags; do
  case "$f" in
    -fprofile-generate=*) gcda_dir="${f#-fprofile-generate=}";;
    -fprofile-instr-generate) instr=yes;;
  esac
done
mkdir -p build/release
root="$(pwd)"
{
  echo '#!/bin/sh'
  echo 'PATH=/usr/bin:/bin'
  echo "echo \"\$@\" >> \"$root/runs.log\""
  if [ -n "$gcda_dir" ]; then
    echo "mkdir -p \"$gcda_dir\" && : > \"$gcda_dir/mujs.gcda\""
  fi
  if [ "$instr" = yes ]; then
    echo 'f="${LLVM_PROFILE_FILE:-default.profraw}"; f="$(echo "$f" | sed "s/%p/$$/")"; mkdir -p "$(dirname "$f")"; : > "$f"'
  fi
} > build/release/mujs
chmod 755 build/release/mujs"##,
  )
}
