//! # Configuration
//!
//! JSON configuration with serde defaults and explicit validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::broadcast::{BroadcastResult, BroadcastTransport, InProcessTransport, NativeTransport};
use crate::observability::{log_event_with_fields, Event};
use crate::table_store::DEFAULT_QUOTA_BYTES;
use crate::workspace::normalize_extensions;

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write config {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "NOTE_CONFIG_READ",
            ConfigError::Write { .. } => "NOTE_CONFIG_WRITE",
            ConfigError::Parse(_) => "NOTE_CONFIG_PARSE",
            ConfigError::Invalid { .. } => "NOTE_CONFIG_INVALID",
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Backing store for the metadata tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableBackend {
    /// One JSON file per table
    #[default]
    File,
    /// Single quota-limited key-value file
    Kv,
    /// Volatile, this process only
    Memory,
}

/// Cross-context notification transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Append-only channel logs under a shared directory, tailed by every
    /// process that opens it; listeners need a runtime
    Native,
    /// Synchronous in-process registry
    #[default]
    InProcess,
}

impl TransportKind {
    /// Build the transport. `dir` is only used by the native transport.
    pub fn build(&self, dir: &Path) -> BroadcastResult<Arc<dyn BroadcastTransport>> {
        Ok(match self {
            TransportKind::Native => Arc::new(NativeTransport::open(dir)?),
            TransportKind::InProcess => Arc::new(InProcessTransport::new()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Data directory (required)
    pub data_dir: PathBuf,

    #[serde(default)]
    pub table_backend: TableBackend,

    /// Quota for the `kv` table backend
    #[serde(default = "default_kv_quota_bytes")]
    pub kv_quota_bytes: usize,

    #[serde(default)]
    pub broadcast_transport: TransportKind,

    /// Table store name, also its broadcast channel
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_reconcile_interval_ms")]
    pub reconcile_interval_ms: u64,

    #[serde(default = "default_reload_unblock_delay_ms")]
    pub reload_unblock_delay_ms: u64,

    /// Extensions listed in workspaces; empty lists everything
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_kv_quota_bytes() -> usize {
    DEFAULT_QUOTA_BYTES
}
fn default_service_name() -> String {
    "notecore".to_string()
}
fn default_reconcile_interval_ms() -> u64 {
    3000
}
fn default_reload_unblock_delay_ms() -> u64 {
    1000
}
fn default_allowed_extensions() -> Vec<String> {
    ["gif", "jpeg", "jpg", "md", "png", "svg", "webp"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

impl CoreConfig {
    /// Defaults rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            table_backend: TableBackend::default(),
            kv_quota_bytes: default_kv_quota_bytes(),
            broadcast_transport: TransportKind::default(),
            service_name: default_service_name(),
            reconcile_interval_ms: default_reconcile_interval_ms(),
            reload_unblock_delay_ms: default_reload_unblock_delay_ms(),
            allowed_extensions: default_allowed_extensions(),
        }
    }

    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut config: CoreConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.allowed_extensions = normalize_extensions(&config.allowed_extensions);
        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("path", path.display().to_string().as_str()),
                ("service_name", config.service_name.as_str()),
            ],
        );
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let write_err = |reason: String| ConfigError::Write {
            path: path.display().to_string(),
            reason,
        };
        let content = serde_json::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        fs::write(path, content).map_err(|e| write_err(e.to_string()))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("data_dir", "must not be empty"));
        }

        if self.service_name.trim().is_empty() {
            return Err(ConfigError::invalid("service_name", "must not be empty"));
        }
        if self
            .service_name
            .chars()
            .any(|c| c == '/' || c == '\\' || c == ':')
        {
            return Err(ConfigError::invalid(
                "service_name",
                format!("'{}' must not contain path separators or ':'", self.service_name),
            ));
        }

        if self.table_backend == TableBackend::Kv && self.kv_quota_bytes == 0 {
            return Err(ConfigError::invalid("kv_quota_bytes", "must be > 0"));
        }

        if self.reconcile_interval_ms == 0 {
            return Err(ConfigError::invalid("reconcile_interval_ms", "must be > 0"));
        }

        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        &self.data_dir
    }

    /// Table store files
    pub fn tables_dir(&self) -> PathBuf {
        self.data_dir.join("tables")
    }

    /// Browser workspace files
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }

    /// Channel logs shared by native transports
    pub fn broadcast_dir(&self) -> PathBuf {
        self.data_dir.join("broadcast")
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    pub fn reload_unblock_delay(&self) -> Duration {
        Duration::from_millis(self.reload_unblock_delay_ms)
    }
}
