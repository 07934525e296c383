/// Application name, stamped into generated wrapper scripts.
pub const APP_NAME: &str = "mujs-pgo";

/// Base name of the produced executable and archive.
pub const BASE_NAME: &str = "mujs";

pub const DEFAULT_SOURCE_REPO: &str = "https://github.com/ccxvii/mujs.git";
pub const DEFAULT_ALLOCATOR_REPO: &str = "https://github.com/microsoft/mimalloc.git";

pub const DEFAULT_COMPILER: &str = "cc";

/// Number of training executions between the instrumented and optimized builds.
pub const DEFAULT_TRAINING_RUNS: u32 = 8;

/// Fewer samples than this do not give a stable profile.
pub const MIN_TRAINING_RUNS: u32 = 2;
