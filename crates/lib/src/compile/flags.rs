/// Compile and link flags for one `make` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileFlags {
  pub cflags: Vec<String>,
  pub ldflags: Vec<String>,
}

impl CompileFlags {
  pub fn cflag(mut self, flag: impl Into<String>) -> Self {
    self.cflags.push(flag.into());
    self
  }

  pub fn ldflag(mut self, flag: impl Into<String>) -> Self {
    self.ldflags.push(flag.into());
    self
  }

  /// Add a flag to both the compile and link lines.
  pub fn both(self, flag: impl Into<String>) -> Self {
    let flag = flag.into();
    self.cflag(flag.clone()).ldflag(flag)
  }

  /// `self` followed by `other`; later flags win on conflicts.
  pub fn merge(mut self, other: &CompileFlags) -> Self {
    self.cflags.extend(other.cflags.iter().cloned());
    self.ldflags.extend(other.ldflags.iter().cloned());
    self
  }

  pub fn cflags_string(&self) -> String {
    self.cflags.join(" ")
  }

  pub fn ldflags_string(&self) -> String {
    self.ldflags.join(" ")
  }
}

/// Warning and optimization flags every build starts from.
///
/// Overriding `CFLAGS` on the make command line replaces the Makefile's own
/// value, so the language level is repeated here.
pub fn base_flags() -> CompileFlags {
  ["-std=c99", "-pedantic", "-Wall", "-Wextra", "-Wno-unused-parameter", "-O2"]
    .into_iter()
    .fold(CompileFlags::default(), CompileFlags::cflag)
}
