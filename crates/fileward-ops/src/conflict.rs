//! Collision detection and collision-free naming.

use std::path::{Path, PathBuf};

use fileward_core::{EngineError, EngineResult};

/// Whether anything, including a dangling symlink, occupies `path`.
pub fn path_occupied(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Generate the first free variant of `path`.
///
/// For "file.txt", tries "file.txt", then "file (1).txt", "file (2).txt", etc.
/// The sequence only depends on what `is_free` reports, so repeating the call
/// against the same state yields the same path.
pub fn unique_path(path: &Path, is_free: impl Fn(&Path) -> bool) -> PathBuf {
    if is_free(path) {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().to_string());

    let mut counter: u64 = 1;
    loop {
        let candidate = match &extension {
            Some(ext) => parent.join(format!("{stem} ({counter}).{ext}")),
            None => parent.join(format!("{stem} ({counter})")),
        };
        if is_free(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Reject a move of `source` to `dest` when `dest` is occupied or lies
/// inside `source`.
pub fn check_move_target(source: &Path, dest: &Path) -> EngineResult<()> {
    if dest != source && dest.starts_with(source) {
        return Err(EngineError::MoveIntoSelf {
            path: source.to_path_buf(),
        });
    }
    if path_occupied(dest) {
        return Err(EngineError::Collision {
            path: dest.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unique_path_free() {
        let path = PathBuf::from("/trash/files/test.txt");
        assert_eq!(unique_path(&path, |_| true), path);
    }

    #[test]
    fn test_unique_path_counter() {
        let taken = [
            PathBuf::from("/t/test.txt"),
            PathBuf::from("/t/test (1).txt"),
        ];
        let renamed = unique_path(Path::new("/t/test.txt"), |p| !taken.iter().any(|t| t == p));
        assert_eq!(renamed, PathBuf::from("/t/test (2).txt"));
    }

    #[test]
    fn test_unique_path_no_extension() {
        let renamed = unique_path(Path::new("/t/testfile"), |p| p != Path::new("/t/testfile"));
        assert_eq!(renamed, PathBuf::from("/t/testfile (1)"));
    }

    #[test]
    fn test_unique_path_dotfile() {
        let renamed = unique_path(Path::new("/t/.bashrc"), |p| p != Path::new("/t/.bashrc"));
        assert_eq!(renamed, PathBuf::from("/t/.bashrc (1)"));
    }

    #[test]
    fn test_check_move_target() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir(&src).unwrap();
        std::fs::write(dir.path().join("taken"), b"x").unwrap();

        assert!(matches!(
            check_move_target(&src, &src.join("inner").join("src")),
            Err(EngineError::MoveIntoSelf { .. })
        ));
        assert!(matches!(
            check_move_target(&src, &dir.path().join("taken")),
            Err(EngineError::Collision { .. })
        ));
        assert!(check_move_target(&src, &dir.path().join("free")).is_ok());
    }
}
