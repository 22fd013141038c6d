//! # File Change Events

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::path::WsPath;

/// Mutation reported by a file provider after the backing write succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileChangeEvent {
    #[serde(rename_all = "camelCase")]
    Create { ws_path: WsPath },
    #[serde(rename_all = "camelCase")]
    Update { ws_path: WsPath },
    #[serde(rename_all = "camelCase")]
    Delete { ws_path: WsPath },
    #[serde(rename_all = "camelCase")]
    Rename { old_ws_path: WsPath, new_ws_path: WsPath },
}

impl FileChangeEvent {
    /// Workspace the change happened in
    pub fn ws_name(&self) -> &str {
        match self {
            FileChangeEvent::Create { ws_path }
            | FileChangeEvent::Update { ws_path }
            | FileChangeEvent::Delete { ws_path } => ws_path.ws_name(),
            FileChangeEvent::Rename { new_ws_path, .. } => new_ws_path.ws_name(),
        }
    }

    /// True if the event touches `path`
    pub fn affects(&self, path: &WsPath) -> bool {
        match self {
            FileChangeEvent::Create { ws_path }
            | FileChangeEvent::Update { ws_path }
            | FileChangeEvent::Delete { ws_path } => ws_path == path,
            FileChangeEvent::Rename { old_ws_path, new_ws_path } => old_ws_path == path || new_ws_path == path,
        }
    }
}

/// Owner callback for file events
pub type FileChangeCallback = Arc<dyn Fn(&FileChangeEvent) + Send + Sync>;
