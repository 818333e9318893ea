//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the lantern binary.

mod commands;
mod handlers;

pub use commands::{Cli, Commands};
pub use handlers::handle_command;
