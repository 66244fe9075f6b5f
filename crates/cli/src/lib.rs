//! Thumbgen CLI library: logging, config discovery and the runner
//!
//! The binary in `main.rs` is a thin clap layer over these modules.

pub mod logging;
pub mod runner;
pub mod system_config;
pub mod util;

pub use runner::Runner;
