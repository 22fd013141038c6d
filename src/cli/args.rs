//! CLI argument definitions using clap
//!
//! Commands:
//! - notecore init --config <path> [--data-dir <dir>]
//! - notecore workspaces --config <path> [--all]
//! - notecore create-workspace <name> --config <path> [--type browser|memory]
//! - notecore delete-workspace <name> --config <path>
//! - notecore files <ws> --config <path>
//! - notecore cat <wsPath> --config <path>
//! - notecore put <wsPath> <text> --config <path>
//! - notecore watch <wsPath> --config <path> [--passes N]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::workspace_db::WorkspaceType;

/// notecore - workspace storage and cross-tab reconciliation for notes
#[derive(Parser, Debug)]
#[command(name = "notecore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the data directory, writing a default config if none exists
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./notecore.json")]
        config: PathBuf,

        /// Data directory for a newly written config
        #[arg(long, default_value = "./notecore-data")]
        data_dir: PathBuf,
    },

    /// List workspaces
    Workspaces {
        /// Path to configuration file
        #[arg(long, default_value = "./notecore.json")]
        config: PathBuf,

        /// Include deleted workspaces
        #[arg(long)]
        all: bool,
    },

    /// Create a workspace
    CreateWorkspace {
        name: String,

        /// Path to configuration file
        #[arg(long, default_value = "./notecore.json")]
        config: PathBuf,

        /// Workspace type
        #[arg(long = "type", default_value = "browser")]
        ws_type: WorkspaceType,
    },

    /// Soft-delete a workspace
    DeleteWorkspace {
        name: String,

        /// Path to configuration file
        #[arg(long, default_value = "./notecore.json")]
        config: PathBuf,
    },

    /// List the supported files of a workspace
    Files {
        ws_name: String,

        /// Path to configuration file
        #[arg(long, default_value = "./notecore.json")]
        config: PathBuf,
    },

    /// Print a note
    Cat {
        /// Path as wsName:relativePath
        ws_path: String,

        /// Path to configuration file
        #[arg(long, default_value = "./notecore.json")]
        config: PathBuf,
    },

    /// Create or overwrite a note
    Put {
        /// Path as wsName:relativePath
        ws_path: String,

        text: String,

        /// Path to configuration file
        #[arg(long, default_value = "./notecore.json")]
        config: PathBuf,
    },

    /// Open a note and report changes made by other processes
    Watch {
        /// Path as wsName:relativePath
        ws_path: String,

        /// Path to configuration file
        #[arg(long, default_value = "./notecore.json")]
        config: PathBuf,

        /// Reconciliation passes to wait for before exiting
        #[arg(long, default_value_t = 10)]
        passes: u32,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_workspace() {
        let cli = Cli::try_parse_from(["notecore", "create-workspace", "scratch", "--type", "memory"]).unwrap();

        match cli.command {
            Command::CreateWorkspace { name, ws_type, config } => {
                assert_eq!(name, "scratch");
                assert_eq!(ws_type, WorkspaceType::Memory);
                assert_eq!(config, PathBuf::from("./notecore.json"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_watch_defaults() {
        let cli = Cli::try_parse_from(["notecore", "watch", "ws:a.md"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { passes: 10, .. }));
    }

    #[test]
    fn test_rejects_unknown_type() {
        assert!(Cli::try_parse_from(["notecore", "create-workspace", "x", "--type", "cloud"]).is_err());
    }
}
