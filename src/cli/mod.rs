//! CLI module for the hooks bridge.
//!
//! Provides command-line interface parsing and command dispatch.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, NotifyEvent};
pub use commands::run;
