//! End-to-end runs of the mujs-pgo binary against a fake toolchain.

mod common;

#[cfg(unix)]
mod build_tests;
