//! Directory listing and single-path stat.

use std::fs;
use std::path::Path;

use fileward_core::{EngineError, EngineResult, FileEntry, FileStat};

/// List the immediate children of `dir`, directories first, then by name
/// ignoring case.
///
/// Entries whose metadata cannot be read are left out.
pub fn list_dir(dir: &Path) -> EngineResult<Vec<FileEntry>> {
    let metadata = fs::metadata(dir).map_err(|e| EngineError::io(dir, e))?;
    if !metadata.is_dir() {
        return Err(EngineError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut entries: Vec<FileEntry> = fs::read_dir(dir)
        .map_err(|e| EngineError::io(dir, e))?
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            match FileEntry::from_path(&path) {
                Ok(found) => Some(found),
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "skipping entry");
                    None
                }
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(entries)
}

/// Detailed metadata of one path.
pub fn stat(path: &Path) -> EngineResult<FileStat> {
    FileStat::from_path(path)
}
