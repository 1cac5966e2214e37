//! CLI module - command definitions and dispatch

pub mod commands;
pub mod handlers;

pub use commands::build_cli;
pub use handlers::{run_command, CliArgs};
