//! CLI command implementations
//!
//! Each command loads the configuration, opens one session against the
//! data directory and prints JSON responses on stdout.

use std::fs;
use std::path::Path;

use serde_json::{json, Map};
use tokio_util::sync::CancellationToken;

use crate::config::CoreConfig;
use crate::file_sha::calculate_git_file_sha;
use crate::file_storage::WsPath;
use crate::session::TabSession;
use crate::workspace_db::{ListOptions, WorkspaceType};

use super::args::Command;
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config, data_dir } => init(&config, &data_dir),
        Command::Workspaces { config, all } => workspaces(&config, all),
        Command::CreateWorkspace { name, config, ws_type } => create_workspace(&config, &name, ws_type),
        Command::DeleteWorkspace { name, config } => delete_workspace(&config, &name),
        Command::Files { ws_name, config } => files(&config, &ws_name),
        Command::Cat { ws_path, config } => cat(&config, &ws_path),
        Command::Put { ws_path, text, config } => put(&config, &ws_path, &text),
        Command::Watch { ws_path, config, passes } => watch(&config, &ws_path, passes),
    }
}

/// Initialize a data directory
///
/// Writes a default configuration pointing at `data_dir` when the config
/// file does not exist yet, then creates the table and file directories.
pub fn init(config_path: &Path, data_dir: &Path) -> CliResult<()> {
    let config = if config_path.exists() {
        CoreConfig::load(config_path)?
    } else {
        let config = CoreConfig::new(data_dir);
        config.save(config_path)?;
        config
    };

    if is_initialized(&config) {
        return Err(CliError::already_initialized());
    }

    for dir in [config.tables_dir(), config.files_dir()] {
        fs::create_dir_all(&dir).map_err(|e| {
            CliError::config_error(format!("Failed to create directory {:?}: {}", dir, e))
        })?;
    }

    write_response(json!({
        "initialized": true,
        "data_dir": config.data_path(),
    }))
}

/// Check if a data directory is initialized
fn is_initialized(config: &CoreConfig) -> bool {
    config.tables_dir().exists() && config.files_dir().exists()
}

fn open_session(config_path: &Path) -> CliResult<TabSession> {
    let config = CoreConfig::load(config_path)?;
    if !is_initialized(&config) {
        return Err(CliError::not_initialized());
    }

    let transport = config.broadcast_transport.build(&config.broadcast_dir())?;
    Ok(TabSession::open(config, transport)?)
}

pub fn workspaces(config_path: &Path, all: bool) -> CliResult<()> {
    let session = open_session(config_path)?;
    let options = if all {
        ListOptions::with_deleted()
    } else {
        ListOptions::default()
    };

    let infos = session.manager().list_workspaces(options)?;
    write_response(serde_json::to_value(infos)?)
}

pub fn create_workspace(config_path: &Path, name: &str, ws_type: WorkspaceType) -> CliResult<()> {
    let session = open_session(config_path)?;
    let workspace = session.manager().create_workspace(name, ws_type, Map::new())?;
    write_response(serde_json::to_value(workspace.info())?)
}

pub fn delete_workspace(config_path: &Path, name: &str) -> CliResult<()> {
    let session = open_session(config_path)?;
    session.manager().delete_workspace(name)?;
    write_response(json!({ "deleted": name }))
}

pub fn files(config_path: &Path, ws_name: &str) -> CliResult<()> {
    let session = open_session(config_path)?;
    let workspace = session.manager().require_workspace(ws_name)?;

    let paths = workspace.list_files(&CancellationToken::new())?;
    write_response(serde_json::to_value(paths)?)
}

pub fn cat(config_path: &Path, ws_path: &str) -> CliResult<()> {
    let session = open_session(config_path)?;
    let path = WsPath::parse(ws_path)?;

    let text = session
        .notes()
        .read_note(&path)?
        .ok_or_else(|| CliError::not_found(path.to_string()))?;
    write_response(json!({ "wsPath": path, "text": text }))
}

/// Create the note, or overwrite it if it exists
pub fn put(config_path: &Path, ws_path: &str, text: &str) -> CliResult<()> {
    let session = open_session(config_path)?;
    let path = WsPath::parse(ws_path)?;
    let notes = session.notes();

    let exists = session
        .manager()
        .require_workspace(path.ws_name())?
        .file_exists(&path)?;
    if exists {
        notes.write_note(&path, text)?;
    } else {
        notes.create_note(&path, text)?;
    }

    write_response(json!({
        "wsPath": path,
        "created": !exists,
        "sha": calculate_git_file_sha(text.as_bytes()),
    }))
}

/// Open a note and report external changes for `passes` reconcile intervals
pub fn watch(config_path: &Path, ws_path: &str, passes: u32) -> CliResult<()> {
    let session = open_session(config_path)?;
    let path = WsPath::parse(ws_path)?;
    let notes = session.notes();

    let text = notes.open_note(&path)?;
    write_response(json!({
        "watching": path.as_str(),
        "sha": text.map(|t| calculate_git_file_sha(t.as_bytes())),
    }))?;

    let mut changes = notes
        .take_external_changes()
        .ok_or_else(|| CliError::new(CliErrorCode::RuntimeError, "External change receiver already taken"))?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::new(CliErrorCode::RuntimeError, e.to_string()))?;
    let window = session.config().reconcile_interval() * passes;

    let reported = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let reconciler = session.spawn_reconciler(cancel.clone());
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        let mut reported = 0usize;
        let outcome = loop {
            tokio::select! {
                _ = &mut deadline => break Ok(()),
                change = changes.recv() => match change {
                    Some(change) => {
                        // Adopt the new disk state so the next change is reported too
                        if let Err(e) = notes.reload_note(&change.ws_path) {
                            break Err(CliError::from(e));
                        }
                        if let Err(e) = serde_json::to_value(&change).map_err(CliError::from).and_then(write_response) {
                            break Err(e);
                        }
                        reported += 1;
                    }
                    None => break Ok(()),
                },
            }
        };

        cancel.cancel();
        let _ = reconciler.await;
        outcome.map(|_| reported)
    })?;

    notes.close_note(&path);
    write_response(json!({ "changes": reported }))
}
