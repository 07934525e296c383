use std::fmt;

use serde::Serialize;

/// Compiler ecosystems with distinct profiling mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerFamily {
  /// Directory-based `.gcda` counters (`-fprofile-generate`/`-fprofile-use`).
  Gcc,
  /// Discrete `.profraw` files merged with `llvm-profdata`.
  LlvmClang,
  Unknown,
}

impl CompilerFamily {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Gcc => "gcc",
      Self::LlvmClang => "llvm-clang",
      Self::Unknown => "unknown",
    }
  }
}

impl fmt::Display for CompilerFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Rules checked in order; the first family with a matching marker wins.
/// GCC markers must stay ahead of LLVM markers.
const RULES: &[(CompilerFamily, &[&str])] = &[
  (CompilerFamily::Gcc, &["gcc", "free software foundation"]),
  (CompilerFamily::LlvmClang, &["clang", "llvm"]),
];

/// Classify a compiler from its `--version` output.
pub fn classify_compiler(version_output: &str) -> CompilerFamily {
  let banner = version_output.to_ascii_lowercase();
  RULES
    .iter()
    .find(|(_, markers)| markers.iter().any(|m| banner.contains(m)))
    .map(|(family, _)| *family)
    .unwrap_or(CompilerFamily::Unknown)
}
