//! Root containment checks.
//!
//! Every path handed to the engine is normalized lexically (separators
//! unified, `.` and `..` resolved) and must then be equal to or below one of
//! the configured roots. Resolution is lexical so paths that do not exist yet,
//! such as a directory about to be created, can be checked too.

use std::path::{Component, Path, PathBuf};

use crate::error::{EngineError, EngineResult};

/// Normalize separators and resolve `.`/`..` segments without touching disk.
///
/// `..` never climbs above the filesystem root.
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let unified;
    let path = match path.to_str() {
        Some(s) if s.contains('\\') => {
            unified = PathBuf::from(s.replace('\\', "/"));
            unified.as_path()
        }
        _ => path,
    };

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Check `path` against `roots` without building a guard.
pub fn is_allowed(path: impl AsRef<Path>, roots: &[PathBuf]) -> bool {
    let path = normalize_path(path);
    path.is_absolute()
        && roots
            .iter()
            .map(normalize_path)
            .any(|root| root.is_absolute() && path.starts_with(&root))
}

/// The set of directories the engine may operate within.
///
/// Replaced wholesale, never merged. An empty guard allows nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootGuard {
    roots: Vec<PathBuf>,
}

impl RootGuard {
    /// Build a guard from absolute root directories.
    pub fn new<I, P>(roots: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut normalized: Vec<PathBuf> = Vec::new();
        for root in roots {
            let root = normalize_path(root);
            if !root.is_absolute() {
                return Err(EngineError::InvalidConfig {
                    message: format!("root must be an absolute path: {}", root.display()),
                });
            }
            if !normalized.contains(&root) {
                normalized.push(root);
            }
        }
        Ok(Self { roots: normalized })
    }

    /// A guard that rejects every path.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The normalized roots.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Whether no roots are configured.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Whether `path` is equal to or below some root.
    pub fn is_allowed(&self, path: impl AsRef<Path>) -> bool {
        is_allowed(path, &self.roots)
    }

    /// Whether `path` is exactly one of the roots.
    pub fn is_root(&self, path: impl AsRef<Path>) -> bool {
        let path = normalize_path(path);
        self.roots.iter().any(|root| *root == path)
    }

    /// Normalize `path` and reject it unless it lies inside a root.
    pub fn check(&self, path: impl AsRef<Path>) -> EngineResult<PathBuf> {
        let normalized = normalize_path(path);
        if self.is_allowed(&normalized) {
            Ok(normalized)
        } else {
            Err(EngineError::RootViolation { path: normalized })
        }
    }

    /// Like [`check`](Self::check), but a root itself is rejected as well.
    ///
    /// Used for sources of move, rename and delete.
    pub fn check_below_root(&self, path: impl AsRef<Path>) -> EngineResult<PathBuf> {
        let normalized = self.check(path)?;
        if self.is_root(&normalized) {
            return Err(EngineError::RootViolation { path: normalized });
        }
        Ok(normalized)
    }

    /// Whether `path` lies inside, or contains, any root.
    pub fn overlaps(&self, path: impl AsRef<Path>) -> bool {
        let path = normalize_path(path);
        self.roots
            .iter()
            .any(|root| path.starts_with(root) || root.starts_with(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> RootGuard {
        RootGuard::new(["/docs", "/srv/share"]).unwrap()
    }

    #[test]
    fn test_normalize_resolves_dots() {
        assert_eq!(normalize_path("/a/./b/../c"), PathBuf::from("/a/c"));
        assert_eq!(normalize_path("/../../etc"), PathBuf::from("/etc"));
        assert_eq!(normalize_path("/a/b/"), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_normalize_unifies_separators() {
        assert_eq!(normalize_path("/docs\\reports\\q1"), PathBuf::from("/docs/reports/q1"));
    }

    #[test]
    fn test_allowed_inside_root() {
        let guard = guard();
        assert!(guard.is_allowed("/docs"));
        assert!(guard.is_allowed("/docs/report.txt"));
        assert!(guard.is_allowed("/srv/share/a/b/c"));
    }

    #[test]
    fn test_rejects_traversal() {
        let guard = guard();
        assert!(!guard.is_allowed("/docs/../etc/passwd"));
        assert!(!guard.is_allowed("/docs/a/../../etc"));
        assert!(!guard.is_allowed("/srv/share/../../root"));
        assert!(guard.is_allowed("/docs/a/../b"));
    }

    #[test]
    fn test_rejects_prefix_lookalikes() {
        let guard = guard();
        assert!(!guard.is_allowed("/docs-private/file"));
        assert!(!guard.is_allowed("/srv"));
    }

    #[test]
    fn test_rejects_relative_paths() {
        let guard = guard();
        assert!(!guard.is_allowed("docs/file"));
        assert!(!guard.is_allowed("../docs"));
    }

    #[test]
    fn test_empty_guard_rejects_everything() {
        let guard = RootGuard::empty();
        assert!(guard.is_empty());
        assert!(!guard.is_allowed("/"));
        assert!(matches!(
            guard.check("/docs"),
            Err(EngineError::RootViolation { .. })
        ));
    }

    #[test]
    fn test_relative_root_is_invalid() {
        assert!(matches!(
            RootGuard::new(["relative/dir"]),
            Err(EngineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_check_below_root() {
        let guard = guard();
        assert!(guard.check_below_root("/docs/file").is_ok());
        assert!(guard.check_below_root("/docs/sub/..").is_err());
    }

    #[test]
    fn test_overlaps() {
        let guard = guard();
        assert!(guard.overlaps("/docs/.trash"));
        assert!(guard.overlaps("/srv"));
        assert!(!guard.overlaps("/var/lib/fileward"));
    }

    #[test]
    fn test_free_function_matches_guard() {
        let roots = vec![PathBuf::from("/docs")];
        assert!(is_allowed("/docs/x", &roots));
        assert!(!is_allowed("/docs/../x", &roots));
    }
}
