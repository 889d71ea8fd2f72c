//! CLI interface for pktstat
//!
//! Argument parsing, logging setup and signal handling for the `pktstat`
//! binary.

pub mod args;
pub mod logging;
pub mod signals;

pub use args::{CaptureArgs, Cli};
