//! Resolved build configuration.
//!
//! A [`BuildConfig`] is assembled once by the CLI from defaults, flags and
//! environment overrides, validated, and then passed by reference to every
//! component. [`Layout`] derives all filesystem locations from it so no
//! component depends on the process working directory.

mod layout;
mod types;

pub use layout::{Layout, archive_name};
pub use types::{BuildConfig, ConfigError, Variant};
