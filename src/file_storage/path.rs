//! # Workspace-Qualified Paths
//!
//! `wsName:relativePath` is the only addressing scheme. The workspace name
//! never contains ':', so the first ':' splits the two parts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{FileStorageError, FileStorageResult};

/// Whether `name` can name a workspace.
///
/// Names become a directory under the files root, so separators and a
/// leading '.' are refused along with ':'.
pub fn is_valid_ws_name(name: &str) -> bool {
    !name.is_empty()
        && name.trim() == name
        && !name.starts_with('.')
        && !name.contains([':', '/', '\\'])
}

/// A validated `wsName:relativePath`. Orders like its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WsPath {
    raw: String,
    sep: usize,
}

impl WsPath {
    /// Parse `wsName:relativePath`
    pub fn parse(raw: &str) -> FileStorageResult<Self> {
        let (ws_name, file_path) = raw
            .split_once(':')
            .ok_or_else(|| FileStorageError::InvalidPath(raw.to_string()))?;
        Self::new(ws_name, file_path)
    }

    /// Build from parts
    pub fn new(ws_name: &str, file_path: &str) -> FileStorageResult<Self> {
        let invalid = || FileStorageError::InvalidPath(format!("{}:{}", ws_name, file_path));

        if !is_valid_ws_name(ws_name) {
            return Err(invalid());
        }
        if file_path.is_empty() || file_path.contains('\\') {
            return Err(invalid());
        }
        if file_path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(invalid());
        }

        Ok(Self {
            raw: format!("{}:{}", ws_name, file_path),
            sep: ws_name.len(),
        })
    }

    pub fn ws_name(&self) -> &str {
        &self.raw[..self.sep]
    }

    /// Path relative to the workspace root, '/'-separated
    pub fn file_path(&self) -> &str {
        &self.raw[self.sep + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        let path = self.file_path();
        path.rsplit('/').next().unwrap_or(path)
    }

    /// Lowercased extension of the file name, without the dot
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(name[idx + 1..].to_ascii_lowercase()),
        }
    }

    /// Same workspace, different relative path
    pub fn with_file_path(&self, file_path: &str) -> FileStorageResult<Self> {
        Self::new(self.ws_name(), file_path)
    }

    pub fn same_workspace(&self, other: &WsPath) -> bool {
        self.ws_name() == other.ws_name()
    }
}

impl fmt::Display for WsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for WsPath {
    type Err = FileStorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WsPath {
    type Error = FileStorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WsPath> for String {
    fn from(path: WsPath) -> Self {
        path.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parts() {
        let path = WsPath::parse("test-ws:notes/a.md").unwrap();
        assert_eq!(path.ws_name(), "test-ws");
        assert_eq!(path.file_path(), "notes/a.md");
        assert_eq!(path.file_name(), "a.md");
        assert_eq!(path.extension().as_deref(), Some("md"));
        assert_eq!(path.to_string(), "test-ws:notes/a.md");
    }

    #[test]
    fn test_relative_path_may_contain_colon() {
        let path = WsPath::parse("ws:meeting 10:30.md").unwrap();
        assert_eq!(path.ws_name(), "ws");
        assert_eq!(path.file_path(), "meeting 10:30.md");
    }

    #[test]
    fn test_rejects_bad_paths() {
        for raw in ["no-separator", ":a.md", "ws:", "ws:/abs.md", "ws:a//b.md", "ws:../up.md", "ws:a\\b.md", "ws:dir/"] {
            assert!(WsPath::parse(raw).is_err(), "{} should be rejected", raw);
        }
    }

    #[test]
    fn test_rejects_traversal_workspace_names() {
        for raw in ["..:x.md", ".:x.md", "a/b:x.md", "a\\b:x.md", ".hidden:x.md"] {
            assert!(WsPath::parse(raw).is_err(), "{} should be rejected", raw);
        }
        assert!(WsPath::new("..", "x.md").is_err());
        assert!(is_valid_ws_name("notes.v2"));
    }

    #[test]
    fn test_extension_edge_cases() {
        assert_eq!(WsPath::parse("ws:.hidden").unwrap().extension(), None);
        assert_eq!(WsPath::parse("ws:README").unwrap().extension(), None);
        assert_eq!(WsPath::parse("ws:IMG.PNG").unwrap().extension().as_deref(), Some("png"));
    }

    #[test]
    fn test_orders_like_string() {
        let mut paths = vec![
            WsPath::parse("a:x.md").unwrap(),
            WsPath::parse("a1:x.md").unwrap(),
            WsPath::parse("a:b/c.md").unwrap(),
        ];
        paths.sort();
        let raw: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();

        let mut expected = vec!["a:x.md", "a1:x.md", "a:b/c.md"];
        expected.sort();
        assert_eq!(raw, expected);
    }

    #[test]
    fn test_serde_as_string() {
        let path = WsPath::parse("ws:a.md").unwrap();
        assert_eq!(serde_json::to_value(&path).unwrap(), serde_json::json!("ws:a.md"));

        let bad: Result<WsPath, _> = serde_json::from_value(serde_json::json!("nope"));
        assert!(bad.is_err());
    }
}
