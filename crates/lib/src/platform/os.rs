use std::fmt;

/// Operating system variants the build runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  FreeBsd,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "freebsd" => Some(Self::FreeBsd),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::FreeBsd => "freebsd",
      Self::Windows => "windows",
    }
  }

  /// Environment variable the dynamic loader reads to inject libraries ahead
  /// of the program's own, if the OS has one.
  pub fn preload_var(&self) -> Option<&'static str> {
    match self {
      Self::Linux | Self::FreeBsd => Some("LD_PRELOAD"),
      Self::MacOs => Some("DYLD_INSERT_LIBRARIES"),
      Self::Windows => None,
    }
  }

  /// File extension of shared libraries, without the leading dot.
  pub fn shared_lib_ext(&self) -> &'static str {
    match self {
      Self::Linux | Self::FreeBsd => "so",
      Self::MacOs => "dylib",
      Self::Windows => "dll",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn macos_uses_darwin_identifier() {
    // Darwin is the expected identifier for macOS in platform triples
    assert_eq!(Os::MacOs.as_str(), "darwin");
  }

  #[test]
  fn preload_variable_per_os() {
    assert_eq!(Os::Linux.preload_var(), Some("LD_PRELOAD"));
    assert_eq!(Os::MacOs.preload_var(), Some("DYLD_INSERT_LIBRARIES"));
    assert_eq!(Os::Windows.preload_var(), None);
  }

  #[test]
  fn shared_library_extensions() {
    assert_eq!(Os::Linux.shared_lib_ext(), "so");
    assert_eq!(Os::MacOs.shared_lib_ext(), "dylib");
    assert_eq!(Os::Windows.shared_lib_ext(), "dll");
  }
}
