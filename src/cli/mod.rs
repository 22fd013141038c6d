//! CLI module for notecore
//!
//! Provides command-line access to:
//! - init: create the data directory
//! - workspace management: list, create, delete
//! - note access: list files, read, write
//! - watch: report external changes to an open note

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    cat, create_workspace, delete_workspace, files, init, put, run, run_command, watch, workspaces,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
