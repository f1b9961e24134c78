//! `pstudio-watcher` library crate.
//!
//! Re-exports the daemon pieces for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod daemon;
pub mod logging;
pub mod reporter;
