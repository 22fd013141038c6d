//! # Local Filesystem Backend
//!
//! Files live at `{root}/{wsName}/{relativePath}`. Every write goes to a
//! staging file first and is renamed into place, so readers in other
//! contexts see either the old or the new content, never a torn one.
//!
//! The creation time is kept next to the content under
//! `{root}/.ctime/{wsName}/{relativePath}` because the replacement inode
//! has a fresh birth time. Workspace names never start with '.', so these
//! directories cannot collide with a workspace.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::backend::{StorageBackend, StoredFile};
use super::errors::{FileStorageError, FileStorageResult};
use super::path::WsPath;

const CTIME_DIR: &str = ".ctime";
const STAGING_DIR: &str = ".staging";

/// Local filesystem storage backend
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local backend
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn workspace_dir(&self, ws_name: &str) -> PathBuf {
        self.root.join(ws_name)
    }

    fn nested(base: PathBuf, path: &WsPath) -> PathBuf {
        let mut full = base.join(path.ws_name());
        for segment in path.file_path().split('/') {
            full.push(segment);
        }
        full
    }

    fn full_path(&self, path: &WsPath) -> PathBuf {
        Self::nested(self.root.clone(), path)
    }

    fn ctime_path(&self, path: &WsPath) -> PathBuf {
        Self::nested(self.root.join(CTIME_DIR), path)
    }

    /// Replace `target` with `content` through a staging file and a rename
    fn replace(&self, target: &Path, content: &[u8], mtime: Option<DateTime<Utc>>) -> io::Result<()> {
        let staging = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = staging.join(format!("{}.tmp", Uuid::new_v4()));
        let staged = stage(&tmp, content, mtime).and_then(|()| fs::rename(&tmp, target));
        if staged.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        staged
    }

    fn read_ctime(&self, path: &WsPath) -> Option<DateTime<Utc>> {
        let raw = fs::read_to_string(self.ctime_path(path)).ok()?;
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    fn collect(&self, ws_name: &str, dir: &Path, prefix: &str, out: &mut Vec<WsPath>) -> FileStorageResult<()> {
        let entries = fs::read_dir(dir).map_err(|e| FileStorageError::io(dir.display().to_string(), e))?;

        for entry in entries {
            let entry = entry.map_err(|e| FileStorageError::io(dir.display().to_string(), e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };

            let file_type = entry
                .file_type()
                .map_err(|e| FileStorageError::io(entry.path().display().to_string(), e))?;
            if file_type.is_dir() {
                self.collect(ws_name, &entry.path(), &relative, out)?;
            } else if let Ok(path) = WsPath::new(ws_name, &relative) {
                out.push(path);
            }
        }

        Ok(())
    }
}

fn stage(tmp: &Path, content: &[u8], mtime: Option<DateTime<Utc>>) -> io::Result<()> {
    let mut handle = fs::File::create(tmp)?;
    handle.write_all(content)?;
    if let Some(mtime) = mtime {
        handle.set_modified(mtime.into())?;
    }
    handle.sync_all()
}

/// Timestamps from the filesystem: birth time where reported, else mtime
fn timestamps(metadata: &fs::Metadata) -> (DateTime<Utc>, DateTime<Utc>) {
    let mtime = metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
    let ctime = metadata.created().map(DateTime::<Utc>::from).unwrap_or(mtime);
    (ctime, mtime)
}

impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn write(&self, path: &WsPath, file: &StoredFile) -> FileStorageResult<()> {
        self.replace(&self.full_path(path), &file.content, Some(file.mtime))
            .map_err(|e| FileStorageError::io(path.as_str(), e))?;
        self.replace(&self.ctime_path(path), file.ctime.to_rfc3339().as_bytes(), None)
            .map_err(|e| FileStorageError::io(path.as_str(), e))
    }

    fn read(&self, path: &WsPath) -> FileStorageResult<Option<StoredFile>> {
        let full_path = self.full_path(path);

        let content = match fs::read(&full_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FileStorageError::io(path.as_str(), e)),
        };
        let metadata = fs::metadata(&full_path).map_err(|e| FileStorageError::io(path.as_str(), e))?;
        let (fs_ctime, mtime) = timestamps(&metadata);
        let ctime = self.read_ctime(path).unwrap_or(fs_ctime);

        Ok(Some(StoredFile { content, ctime, mtime }))
    }

    fn delete(&self, path: &WsPath) -> FileStorageResult<()> {
        match fs::remove_file(self.full_path(path)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FileStorageError::io(path.as_str(), e)),
        }
        // A stale ctime would be picked up by a later file at this path
        match fs::remove_file(self.ctime_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileStorageError::io(path.as_str(), e)),
        }
    }

    fn rename(&self, from: &WsPath, to: &WsPath) -> FileStorageResult<()> {
        let target = self.full_path(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| FileStorageError::io(to.as_str(), e))?;
        }

        fs::rename(self.full_path(from), &target).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FileStorageError::FileNotFound(from.to_string())
            } else {
                FileStorageError::io(from.as_str(), e)
            }
        })?;

        let old_ctime = self.ctime_path(from);
        if !old_ctime.is_file() {
            return Ok(());
        }
        let new_ctime = self.ctime_path(to);
        if let Some(parent) = new_ctime.parent() {
            fs::create_dir_all(parent).map_err(|e| FileStorageError::io(to.as_str(), e))?;
        }
        fs::rename(old_ctime, new_ctime).map_err(|e| FileStorageError::io(to.as_str(), e))
    }

    fn exists(&self, path: &WsPath) -> FileStorageResult<bool> {
        Ok(self.full_path(path).is_file())
    }

    fn list(&self, ws_name: &str) -> FileStorageResult<Vec<WsPath>> {
        let dir = self.workspace_dir(ws_name);
        let mut results = Vec::new();

        if dir.is_dir() {
            self.collect(ws_name, &dir, "", &mut results)?;
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path(raw: &str) -> WsPath {
        WsPath::parse(raw).unwrap()
    }

    #[test]
    fn test_write_read() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write(&path("ws:test.txt"), &StoredFile::new(b"hello".to_vec())).unwrap();
        let file = backend.read(&path("ws:test.txt")).unwrap().unwrap();
        assert_eq!(file.content, b"hello");
        assert!(temp.path().join("ws").join("test.txt").is_file());
    }

    #[test]
    fn test_nested_path() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write(&path("ws:a/b/c/file.txt"), &StoredFile::new(b"nested".to_vec())).unwrap();
        let file = backend.read(&path("ws:a/b/c/file.txt")).unwrap().unwrap();
        assert_eq!(file.content, b"nested");
    }

    #[test]
    fn test_mtime_applied() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        let mut file = StoredFile::new(b"x".to_vec());
        file.mtime = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        backend.write(&path("ws:t.md"), &file).unwrap();

        let read = backend.read(&path("ws:t.md")).unwrap().unwrap();
        assert_eq!(read.mtime.timestamp(), file.mtime.timestamp());
    }

    #[test]
    fn test_delete() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write(&path("ws:delete-me.txt"), &StoredFile::new(b"bye".to_vec())).unwrap();
        assert!(backend.exists(&path("ws:delete-me.txt")).unwrap());

        backend.delete(&path("ws:delete-me.txt")).unwrap();
        assert!(!backend.exists(&path("ws:delete-me.txt")).unwrap());

        // Second delete is a no-op
        backend.delete(&path("ws:delete-me.txt")).unwrap();
    }

    #[test]
    fn test_not_found() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        assert!(backend.read(&path("ws:nonexistent.txt")).unwrap().is_none());
        assert!(matches!(
            backend.rename(&path("ws:nonexistent.txt"), &path("ws:other.txt")),
            Err(FileStorageError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_list_recursive() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write(&path("ws:a.md"), &StoredFile::new(Vec::new())).unwrap();
        backend.write(&path("ws:dir/sub/b.md"), &StoredFile::new(Vec::new())).unwrap();
        backend.write(&path("other:c.md"), &StoredFile::new(Vec::new())).unwrap();

        let mut listed = backend.list("ws").unwrap();
        listed.sort();
        assert_eq!(listed, vec![path("ws:a.md"), path("ws:dir/sub/b.md")]);
        assert!(backend.list("missing").unwrap().is_empty());
    }

    #[test]
    fn test_ctime_survives_rewrite_and_rename() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());
        let created = DateTime::parse_from_rfc3339("2023-05-06T07:08:09Z").unwrap().with_timezone(&Utc);

        let mut file = StoredFile::new(b"v1".to_vec());
        file.ctime = created;
        backend.write(&path("ws:a.md"), &file).unwrap();

        let rewrite = StoredFile {
            content: b"v2".to_vec(),
            ctime: created,
            mtime: Utc::now(),
        };
        backend.write(&path("ws:a.md"), &rewrite).unwrap();
        backend.rename(&path("ws:a.md"), &path("ws:b/a.md")).unwrap();

        let read = backend.read(&path("ws:b/a.md")).unwrap().unwrap();
        assert_eq!(read.content, b"v2");
        assert_eq!(read.ctime, created);
    }

    #[test]
    fn test_write_leaves_no_staging_files_in_listing() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        for n in 0..3 {
            backend
                .write(&path("ws:a.md"), &StoredFile::new(format!("v{}", n).into_bytes()))
                .unwrap();
        }

        assert_eq!(backend.list("ws").unwrap(), vec![path("ws:a.md")]);
        assert_eq!(fs::read_dir(temp.path().join(STAGING_DIR)).unwrap().count(), 0);
    }

    #[test]
    fn test_delete_drops_ctime() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write(&path("ws:a.md"), &StoredFile::new(b"x".to_vec())).unwrap();
        backend.delete(&path("ws:a.md")).unwrap();

        assert!(!temp.path().join(CTIME_DIR).join("ws").join("a.md").exists());
    }

    #[test]
    fn test_rename_creates_parent() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::new(temp.path().to_path_buf());

        backend.write(&path("ws:a.md"), &StoredFile::new(b"moved".to_vec())).unwrap();
        backend.rename(&path("ws:a.md"), &path("ws:archive/a.md")).unwrap();

        assert!(!backend.exists(&path("ws:a.md")).unwrap());
        let file = backend.read(&path("ws:archive/a.md")).unwrap().unwrap();
        assert_eq!(file.content, b"moved");
    }
}
