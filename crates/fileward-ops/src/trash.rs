//! Recoverable trash for soft-deleted items.
//!
//! Layout under the trash root:
//!
//! ```text
//! files/<staged name>        the staged item itself
//! info/<staged name>.json    its TrashRecord
//! ```
//!
//! Records are written before the item is moved, so a staged item always has a
//! record describing where it came from, even across restarts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use fileward_core::{normalize_path, EngineError, EngineResult};
use serde::{Deserialize, Serialize};

use crate::conflict::{path_occupied, unique_path};
use crate::move_op::move_item;

const FILES_DIR: &str = "files";
const INFO_DIR: &str = "info";
const INFO_EXTENSION: &str = "json";

/// Where a trashed item came from and where it is staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashRecord {
    /// Absolute path the item was deleted from.
    pub original_path: PathBuf,
    /// Current location inside the trash.
    pub staged_path: PathBuf,
    /// File name inside `files/`, possibly suffixed to avoid collisions.
    pub staged_name: String,
    /// RFC 3339 UTC deletion time.
    pub deleted_at: String,
    /// Batch that trashed the item.
    pub batch_id: String,
    pub is_dir: bool,
}

/// Stages deletions into, and restores them from, the trash root.
#[derive(Debug)]
pub struct TrashManager {
    root: PathBuf,
    lock: Mutex<()>,
}

impl TrashManager {
    /// Create a manager for the trash at `root`. Nothing is created on disk yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    /// The trash root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_DIR)
    }

    fn info_dir(&self) -> PathBuf {
        self.root.join(INFO_DIR)
    }

    fn info_path(&self, staged_name: &str) -> PathBuf {
        self.info_dir()
            .join(format!("{staged_name}.{INFO_EXTENSION}"))
    }

    /// Create the trash directories if needed.
    pub fn ensure_layout(&self) -> EngineResult<()> {
        for dir in [self.files_dir(), self.info_dir()] {
            fs::create_dir_all(&dir).map_err(|e| EngineError::io(&dir, e))?;
        }
        Ok(())
    }

    /// Move `original` into the trash and return its record.
    pub fn stage(&self, original: &Path, batch_id: &str) -> EngineResult<TrashRecord> {
        let metadata = fs::symlink_metadata(original).map_err(|e| EngineError::io(original, e))?;
        let name = original
            .file_name()
            .ok_or_else(|| EngineError::invalid_name(original.to_string_lossy(), "path has no file name"))?;

        let _guard = self
            .lock
            .lock()
            .map_err(|_| EngineError::trash("trash lock poisoned"))?;
        self.ensure_layout()?;

        let staged_path = unique_path(&self.files_dir().join(name), |candidate| {
            let staged_name = candidate
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            !path_occupied(candidate) && !path_occupied(&self.info_path(&staged_name))
        });
        let staged_name = staged_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let record = TrashRecord {
            original_path: original.to_path_buf(),
            staged_path: staged_path.clone(),
            staged_name: staged_name.clone(),
            deleted_at: Utc::now().to_rfc3339(),
            batch_id: batch_id.to_string(),
            is_dir: metadata.is_dir(),
        };

        let info_path = self.info_path(&staged_name);
        write_record(&info_path, &record)?;

        if let Err(e) = move_item(original, &staged_path) {
            let _ = fs::remove_file(&info_path);
            return Err(EngineError::io(original, e));
        }

        tracing::debug!(
            original = %original.display(),
            staged = %staged_path.display(),
            "staged item in trash"
        );
        Ok(record)
    }

    /// Move the item staged at `staged_path` back to `original`.
    ///
    /// `original` must match the path in the item's record. Fails with
    /// `RestoreConflict` and leaves the item in the trash when the original
    /// path is occupied.
    pub fn restore(&self, staged_path: &Path, original: &Path) -> EngineResult<PathBuf> {
        let staged_name = staged_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| EngineError::NotFound {
                path: staged_path.to_path_buf(),
            })?;

        let _guard = self
            .lock
            .lock()
            .map_err(|_| EngineError::trash("trash lock poisoned"))?;

        let info_path = self.info_path(&staged_name);
        let record = self.record(&staged_name)?;

        if normalize_path(&record.original_path) != normalize_path(original) {
            return Err(EngineError::trash(format!(
                "{} was deleted from {}, not {}",
                staged_name,
                record.original_path.display(),
                original.display()
            )));
        }

        if !path_occupied(&record.staged_path) {
            return Err(EngineError::NotFound {
                path: record.staged_path,
            });
        }
        if path_occupied(&record.original_path) {
            return Err(EngineError::RestoreConflict {
                path: record.original_path,
            });
        }

        if let Some(parent) = record.original_path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        move_item(&record.staged_path, &record.original_path)
            .map_err(|e| EngineError::io(&record.original_path, e))?;

        if let Err(e) = fs::remove_file(&info_path) {
            tracing::warn!(path = %info_path.display(), error = %e, "failed to remove trash record");
        }

        Ok(record.original_path)
    }

    /// Load the record of one staged item.
    pub fn record(&self, staged_name: &str) -> EngineResult<TrashRecord> {
        read_record(&self.info_path(staged_name))
    }

    /// Every record currently in the trash, oldest deletion first.
    pub fn list(&self) -> EngineResult<Vec<TrashRecord>> {
        let info_dir = self.info_dir();
        let entries = match fs::read_dir(&info_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EngineError::io(&info_dir, e)),
        };

        let mut records: Vec<TrashRecord> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == INFO_EXTENSION))
            .filter_map(|path| match read_record(&path) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable trash record");
                    None
                }
            })
            .collect();

        records.sort_by(|a, b| {
            a.deleted_at
                .cmp(&b.deleted_at)
                .then_with(|| a.staged_name.cmp(&b.staged_name))
        });
        Ok(records)
    }
}

fn write_record(path: &Path, record: &TrashRecord) -> EngineResult<()> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| EngineError::trash(format!("cannot encode trash record: {e}")))?;
    fs::write(path, json).map_err(|e| EngineError::io(path, e))
}

fn read_record(path: &Path) -> EngineResult<TrashRecord> {
    let content = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| EngineError::trash(format!("corrupt record {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TrashManager, PathBuf) {
        let dir = TempDir::new().unwrap();
        let trash = TrashManager::new(dir.path().join("trash"));
        let work = dir.path().join("work");
        fs::create_dir_all(&work).unwrap();
        (dir, trash, work)
    }

    #[test]
    fn test_stage_and_restore() {
        let (_dir, trash, work) = setup();
        let file = work.join("notes.txt");
        fs::write(&file, b"keep me").unwrap();

        let record = trash.stage(&file, "b1").unwrap();
        assert!(!file.exists());
        assert!(record.staged_path.exists());
        assert_eq!(record.staged_name, "notes.txt");
        assert_eq!(trash.record("notes.txt").unwrap(), record);

        let restored = trash.restore(&record.staged_path, &record.original_path).unwrap();
        assert_eq!(restored, file);
        assert_eq!(fs::read(&file).unwrap(), b"keep me");
        assert!(trash.list().unwrap().is_empty());
    }

    #[test]
    fn test_collisions_get_counter_suffix() {
        let (_dir, trash, work) = setup();
        let mut staged = Vec::new();
        for i in 0..3 {
            let sub = work.join(format!("d{i}"));
            fs::create_dir(&sub).unwrap();
            let file = sub.join("report.txt");
            fs::write(&file, format!("{i}")).unwrap();
            staged.push(trash.stage(&file, "b").unwrap().staged_name);
        }
        assert_eq!(staged, ["report.txt", "report (1).txt", "report (2).txt"]);
        assert_eq!(trash.list().unwrap().len(), 3);
    }

    #[test]
    fn test_restore_conflict_leaves_item_in_trash() {
        let (_dir, trash, work) = setup();
        let file = work.join("a.txt");
        fs::write(&file, b"old").unwrap();
        let record = trash.stage(&file, "b1").unwrap();

        fs::write(&file, b"new").unwrap();
        let err = trash.restore(&record.staged_path, &record.original_path).unwrap_err();
        assert!(matches!(err, EngineError::RestoreConflict { .. }));
        assert!(record.staged_path.exists());
        assert_eq!(fs::read(&file).unwrap(), b"new");
        assert_eq!(trash.list().unwrap().len(), 1);
    }

    #[test]
    fn test_restore_recreates_missing_parent() {
        let (_dir, trash, work) = setup();
        let sub = work.join("sub");
        fs::create_dir(&sub).unwrap();
        let file = sub.join("x.bin");
        fs::write(&file, b"x").unwrap();

        let record = trash.stage(&file, "b1").unwrap();
        fs::remove_dir(&sub).unwrap();

        trash.restore(&record.staged_path, &record.original_path).unwrap();
        assert!(file.exists());
    }

    #[test]
    fn test_stage_missing_is_not_found() {
        let (_dir, trash, work) = setup();
        let err = trash.stage(&work.join("ghost"), "b1").unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn test_stage_directory() {
        let (_dir, trash, work) = setup();
        let folder = work.join("album");
        fs::create_dir_all(folder.join("2024")).unwrap();
        fs::write(folder.join("2024").join("a.jpg"), b"jpg").unwrap();

        let record = trash.stage(&folder, "b1").unwrap();
        assert!(record.is_dir);
        assert!(record.staged_path.join("2024").join("a.jpg").exists());

        trash.restore(&record.staged_path, &record.original_path).unwrap();
        assert!(folder.join("2024").join("a.jpg").exists());
    }

    #[test]
    fn test_restore_requires_matching_original() {
        let (_dir, trash, work) = setup();
        let file = work.join("a.txt");
        fs::write(&file, b"a").unwrap();
        let record = trash.stage(&file, "b1").unwrap();

        let err = trash
            .restore(&record.staged_path, &work.join("elsewhere.txt"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Trash { .. }));
        assert!(record.staged_path.exists());
        assert!(!work.join("elsewhere.txt").exists());

        let lexical = work.join("sub").join("..").join("a.txt");
        trash.restore(&record.staged_path, &lexical).unwrap();
        assert!(file.exists());
    }

    #[test]
    fn test_corrupt_record_is_a_trash_error() {
        let (_dir, trash, work) = setup();
        let file = work.join("a.txt");
        fs::write(&file, b"a").unwrap();
        let record = trash.stage(&file, "b1").unwrap();
        fs::write(trash.info_path(&record.staged_name), "{ not json").unwrap();

        let err = trash
            .restore(&record.staged_path, &record.original_path)
            .unwrap_err();
        assert!(matches!(err, EngineError::Trash { .. }));
        assert!(trash.list().unwrap().is_empty());
    }
}
