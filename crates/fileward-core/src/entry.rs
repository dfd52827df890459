//! Listing records produced by directory listing, stat and search.

use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// A single entry of a directory listing or search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File or directory name (not full path).
    pub name: String,
    /// Absolute path.
    pub path: String,
    /// Whether this entry is a directory.
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    /// Size in bytes; always 0 for directories.
    pub size: u64,
    /// Last modification time, RFC 3339 UTC.
    pub modified: String,
    /// Extension of regular files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
}

impl FileEntry {
    /// Read the entry for `path` from disk.
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_metadata(path, &metadata)
    }

    /// Build the entry from already loaded metadata.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> EngineResult<Self> {
        let name = file_name(path)?;
        let is_dir = metadata.is_dir();
        let ext = if metadata.is_file() {
            path.extension().map(|e| e.to_string_lossy().to_string())
        } else {
            None
        };

        Ok(Self {
            name,
            path: path.to_string_lossy().to_string(),
            is_dir,
            size: if is_dir { 0 } else { metadata.len() },
            modified: format_time(metadata.modified().ok()),
            ext,
        })
    }
}

/// Detailed metadata for a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub name: String,
    pub path: String,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    pub size: u64,
    pub modified: String,
    /// Creation time, empty when the platform does not report it.
    pub created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

impl FileStat {
    /// Read the stat record for `path` from disk.
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| EngineError::io(path, e))?;
        let entry = FileEntry::from_metadata(path, &metadata)?;

        Ok(Self {
            name: entry.name,
            path: entry.path,
            is_dir: entry.is_dir,
            size: entry.size,
            modified: entry.modified,
            created: format_time(metadata.created().ok()),
            permissions: Some(permissions_string(&metadata)),
        })
    }
}

/// Format a timestamp as RFC 3339 UTC, or an empty string when unknown.
pub fn format_time(time: Option<SystemTime>) -> String {
    time.map(|t| DateTime::<Utc>::from(t).to_rfc3339())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> EngineResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| EngineError::invalid_name(path.to_string_lossy(), "path has no file name"))
}

#[cfg(unix)]
fn permissions_string(metadata: &Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    let flags = ['r', 'w', 'x'];
    (0..9)
        .map(|i| {
            if mode & (1 << (8 - i)) != 0 {
                flags[i % 3]
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(not(unix))]
fn permissions_string(metadata: &Metadata) -> String {
    if metadata.permissions().readonly() {
        "readonly".to_string()
    } else {
        "readwrite".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_entry_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.PDF");
        std::fs::write(&path, b"12345").unwrap();

        let entry = FileEntry::from_path(&path).unwrap();
        assert_eq!(entry.name, "report.PDF");
        assert!(!entry.is_dir);
        assert_eq!(entry.size, 5);
        assert_eq!(entry.ext.as_deref(), Some("PDF"));
        assert!(!entry.modified.is_empty());
    }

    #[test]
    fn test_directory_has_zero_size_and_no_ext() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("photos.d");
        std::fs::create_dir(&sub).unwrap();

        let entry = FileEntry::from_path(&sub).unwrap();
        assert!(entry.is_dir);
        assert_eq!(entry.size, 0);
        assert!(entry.ext.is_none());
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = FileEntry {
            name: "a".into(),
            path: "/x/a".into(),
            is_dir: true,
            size: 0,
            modified: String::new(),
            ext: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["isDir"], true);
        assert!(json.get("ext").is_none());
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = FileEntry::from_path(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_stat_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.sh");
        std::fs::write(&path, b"#!/bin/sh").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o754)).unwrap();

        let stat = FileStat::from_path(&path).unwrap();
        assert_eq!(stat.permissions.as_deref(), Some("rwxr-xr--"));
    }
}
