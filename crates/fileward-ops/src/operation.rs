//! File operation requests.

use std::path::PathBuf;

use fileward_core::ActionKind;
use serde::{Deserialize, Serialize};

/// A user-initiated operation, executed as one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOperation {
    /// Create a directory named `name` inside `parent`.
    CreateDirectory { parent: PathBuf, name: String },
    /// Rename a single file or directory within its parent.
    Rename { source: PathBuf, new_name: String },
    /// Move files/directories into a destination directory.
    Move {
        sources: Vec<PathBuf>,
        destination: PathBuf,
    },
    /// Stage files/directories into the trash.
    Delete { targets: Vec<PathBuf> },
}

impl FileOperation {
    /// Create a directory creation operation.
    pub fn create_directory(parent: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::CreateDirectory {
            parent: parent.into(),
            name: name.into(),
        }
    }

    /// Create a rename operation.
    pub fn rename(source: impl Into<PathBuf>, new_name: impl Into<String>) -> Self {
        Self::Rename {
            source: source.into(),
            new_name: new_name.into(),
        }
    }

    /// Create a move operation.
    pub fn move_to(sources: Vec<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::Move {
            sources,
            destination: destination.into(),
        }
    }

    /// Create a delete operation.
    pub fn delete(targets: Vec<PathBuf>) -> Self {
        Self::Delete { targets }
    }

    /// The action log kind this operation is recorded as.
    pub fn action(&self) -> ActionKind {
        match self {
            Self::CreateDirectory { .. } => ActionKind::CreateDir,
            Self::Rename { .. } => ActionKind::Rename,
            Self::Move { .. } => ActionKind::Move,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    /// Number of items the batch will report on.
    pub fn item_count(&self) -> usize {
        match self {
            Self::CreateDirectory { .. } | Self::Rename { .. } => 1,
            Self::Move { sources, .. } => sources.len(),
            Self::Delete { targets } => targets.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_action_and_count() {
        let op = FileOperation::move_to(vec!["/a".into(), "/b".into()], "/dest");
        assert_eq!(op.action(), ActionKind::Move);
        assert_eq!(op.item_count(), 2);

        let op = FileOperation::create_directory("/docs", "new");
        assert_eq!(op.action(), ActionKind::CreateDir);
        assert_eq!(op.item_count(), 1);

        let op = FileOperation::delete(vec![]);
        assert_eq!(op.item_count(), 0);
    }
}
