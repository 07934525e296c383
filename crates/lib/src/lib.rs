//! mujs-pgo-lib: Core types and logic for building mujs with PGO and mimalloc
//!
//! The build runs as a fixed pipeline:
//! - `probe`: detect platform, required tools, and the compiler family
//! - `fetch`: shallow-clone or refresh the mujs and mimalloc checkouts
//! - `allocator`: configure, build, and install mimalloc to a private prefix
//! - `compile` + `pgo`: drive the instrument/train/optimize state machine
//! - `package`: lay out the output directory and optional archive

pub mod allocator;
pub mod compile;
pub mod config;
pub mod consts;
pub mod exec;
pub mod fetch;
pub mod orchestrate;
pub mod package;
pub mod pgo;
pub mod platform;
pub mod probe;
pub mod util;
