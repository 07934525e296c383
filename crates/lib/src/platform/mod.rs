pub mod arch;
pub mod os;

use arch::Arch;
use os::Os;
use serde::Serialize;
use std::fmt;

/// Platform identifier combining architecture and OS (e.g., "x86_64-linux")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  /// Create a new platform identifier
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// Returns the platform triple for the current system (e.g., "aarch64-darwin")
///
/// Returns `None` if the current platform is not supported
pub fn platform_triple() -> Option<String> {
  Platform::current().map(|p| p.triple())
}

/// The shell layer the build tools run under.
///
/// MSYS2, MinGW and Cygwin provide a POSIX toolchain on Windows, but produce
/// `.exe` binaries and have no dynamic-loader preload mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformKind {
  PosixLike,
  WindowsCompatLayer,
}

impl PlatformKind {
  /// Classify the platform from the `MSYSTEM` and `OSTYPE` environment values
  /// and the host OS.
  pub fn classify(msystem: Option<&str>, ostype: Option<&str>, os: Option<Os>) -> Self {
    let msystem_set = msystem.is_some_and(|v| !v.trim().is_empty());
    let compat_ostype = ostype
      .map(str::to_ascii_lowercase)
      .is_some_and(|v| v.contains("msys") || v.contains("cygwin"));

    if msystem_set || compat_ostype || os == Some(Os::Windows) {
      Self::WindowsCompatLayer
    } else {
      Self::PosixLike
    }
  }

  /// Detect the platform kind from the current process environment.
  pub fn detect() -> Self {
    let msystem = std::env::var("MSYSTEM").ok();
    let ostype = std::env::var("OSTYPE").ok();
    Self::classify(msystem.as_deref(), ostype.as_deref(), Os::current())
  }

  /// Suffix appended to executables built on this platform.
  pub fn exe_suffix(&self) -> &'static str {
    match self {
      Self::PosixLike => "",
      Self::WindowsCompatLayer => ".exe",
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::PosixLike => "posix",
      Self::WindowsCompatLayer => "windows-compat",
    }
  }
}

impl fmt::Display for PlatformKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn platform_triple_format() {
    // Verifies the triple format is "arch-os"
    let platform = Platform::new(Arch::Aarch64, Os::MacOs);
    assert_eq!(platform.triple(), "aarch64-darwin");

    let platform = Platform::new(Arch::X86_64, Os::Linux);
    assert_eq!(platform.triple(), "x86_64-linux");
  }

  #[test]
  fn msystem_marks_windows_compat_layer() {
    let kind = PlatformKind::classify(Some("MINGW64"), None, Some(Os::Linux));
    assert_eq!(kind, PlatformKind::WindowsCompatLayer);
    assert_eq!(kind.exe_suffix(), ".exe");
  }

  #[test]
  fn empty_msystem_is_ignored() {
    let kind = PlatformKind::classify(Some("  "), None, Some(Os::Linux));
    assert_eq!(kind, PlatformKind::PosixLike);
  }

  #[test]
  fn cygwin_ostype_marks_windows_compat_layer() {
    assert_eq!(
      PlatformKind::classify(None, Some("Cygwin"), Some(Os::Linux)),
      PlatformKind::WindowsCompatLayer
    );
    assert_eq!(
      PlatformKind::classify(None, Some("msys"), None),
      PlatformKind::WindowsCompatLayer
    );
  }

  #[test]
  fn plain_linux_is_posix() {
    let kind = PlatformKind::classify(None, Some("linux-gnu"), Some(Os::Linux));
    assert_eq!(kind, PlatformKind::PosixLike);
    assert_eq!(kind.exe_suffix(), "");
  }

  #[test]
  #[serial]
  #[cfg(unix)]
  fn detect_reads_msystem() {
    temp_env::with_vars([("MSYSTEM", Some("UCRT64")), ("OSTYPE", None::<&str>)], || {
      assert_eq!(PlatformKind::detect(), PlatformKind::WindowsCompatLayer);
    });
    temp_env::with_vars([("MSYSTEM", None::<&str>), ("OSTYPE", None::<&str>)], || {
      assert_eq!(PlatformKind::detect(), PlatformKind::PosixLike);
    });
  }
}
