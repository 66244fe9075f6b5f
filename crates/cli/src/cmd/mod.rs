//! Command implementations

pub mod config;
pub mod gc;
pub mod regenerate;
pub mod watch;
