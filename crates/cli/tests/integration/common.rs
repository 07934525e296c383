//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets a work directory with pre-existing (non-git) checkouts, so
/// fetching falls back to the local trees without touching the network, and
/// a `bin/` directory that is the only entry on `PATH`.
pub struct TestEnv {
  pub temp: TempDir,
  pub bin: PathBuf,
  pub work: PathBuf,
}

impl TestEnv {
  /// Fake `make` plus a compiler named `cc` answering `--version` with `banner`.
  pub fn with_compiler(banner: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    let work = temp.path().join("work");
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::create_dir_all(work.join("mujs")).unwrap();
    std::fs::create_dir_all(work.join("mimalloc")).unwrap();
    let work = dunce::canonicalize(&work).unwrap_or(work);

    let env = Self { temp, bin, work };
    env.tool("make", FAKE_MAKE);
    env.tool(
      "cc",
      &format!(
        "if [ \"$1\" = \"--version\" ]; then printf '%s\\n' '{}'; exit 0; fi\nexit 1",
        banner
      ),
    );
    env
  }

  /// GCC-family toolchain.
  pub fn gcc() -> Self {
    Self::with_compiler("gcc (GCC) 13.2.0")
  }

  /// Write an executable script into `bin/`.
  pub fn tool(&self, name: &str, body: &str) -> PathBuf {
    write_script(&self.bin, name, body)
  }

  /// Add a `cmake` that installs a fake mimalloc under `CMAKE_INSTALL_PREFIX`.
  pub fn with_cmake(self) -> Self {
    self.tool("cmake", FAKE_CMAKE);
    self
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.work.join(relative)
  }

  pub fn read(&self, relative: &str) -> String {
    std::fs::read_to_string(self.path(relative)).unwrap_or_default()
  }

  /// Get a pre-configured Command for the mujs-pgo binary.
  ///
  /// `PATH` holds only the fake toolchain, and every environment variable the
  /// tool reads is cleared so the host setup cannot leak in.
  pub fn cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("mujs-pgo");
    cmd.env("PATH", &self.bin);
    for var in ["CC", "JOBS", "MSYSTEM", "OSTYPE", "LLVM_PROFDATA", "RUST_LOG"] {
      cmd.env_remove(var);
    }
    cmd.arg("-C").arg(&self.work).arg("-j").arg("2");
    cmd
  }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  let path = dir.join(name);
  std::fs::write(&path, format!("#!/bin/sh\nPATH=/usr/bin:/bin\n{}\n", body)).unwrap();
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }
  path
}

/// Logs to `make.log`; builds `build/release/mujs`, which logs to `runs.log`
/// and emits profile files the way an instrumented binary would.
const FAKE_MAKE: &str = r##"echo "$*" >> make.log
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
  echo "[ -f \"$root/fail-training\" ] && exit 3"
  echo "echo \"\$@\" >> \"$root/runs.log\""
  if [ -n "$gcda_dir" ]; then
    echo "mkdir -p \"$gcda_dir\" && : > \"$gcda_dir/mujs.gcda\""
  fi
  if [ "$instr" = yes ]; then
    echo 'f="${LLVM_PROFILE_FILE:-default.profraw}"; f="$(echo "$f" | sed "s/%p/$$/")"; mkdir -p "$(dirname "$f")"; : > "$f"'
  fi
} > build/release/mujs
chmod 755 build/release/mujs"##;

/// Records its arguments to `cmake.log` in the build dir's parent and
/// installs a header, shared library and override object on `--install`.
const FAKE_CMAKE: &str = r##"case "$1" in
  -S)
    build="$4"
    mkdir -p "$build"
    for a in "$@"; do
      case "$a" in -DCMAKE_INSTALL_PREFIX=*) echo "${a#-DCMAKE_INSTALL_PREFIX=}" > "$build/prefix";; esac
    done
    echo "configure $*" >> "$build/../cmake.log"
    ;;
  --build)
    echo "build $*" >> "$2/../cmake.log"
    ;;
  --install)
    prefix="$(cat "$2/prefix")"
    mkdir -p "$prefix/include" "$prefix/lib"
    : > "$prefix/include/mimalloc.h"
    : > "$prefix/lib/libmimalloc.so"
    : > "$prefix/lib/libmimalloc.dylib"
    : > "$prefix/lib/mimalloc.o"
    echo "install $*" >> "$2/../cmake.log"
    ;;
esac"##;
