//! Error types for engine operations.

use std::path::PathBuf;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Result alias used throughout fileward.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while operating on the filesystem.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested file or folder name is not acceptable.
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The path resolves outside every allowed root.
    #[error("Path is outside the allowed roots: {path}")]
    RootViolation { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Something already occupies the target path.
    #[error("Destination already exists: {path}")]
    Collision { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory cannot be moved into itself or one of its descendants.
    #[error("Cannot move a directory into itself: {path}")]
    MoveIntoSelf { path: PathBuf },

    /// Expected a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// A directory that should be removed still has content.
    #[error("Directory is not empty: {path}")]
    DirectoryNotEmpty { path: PathBuf },

    /// No eligible batch is left in the action log.
    #[error("Nothing to undo")]
    NothingToUndo,

    /// The path an undo wants to restore to is occupied.
    #[error("Cannot restore, path is occupied: {path}")]
    RestoreConflict { path: PathBuf },

    /// The action log could not be read or written.
    #[error("Action log error: {message}")]
    ActionLog { message: String },

    /// The trash area or one of its records is unusable.
    #[error("Trash error: {message}")]
    Trash { message: String },

    /// Persisted settings could not be read or written.
    #[error("Settings error: {message}")]
    Settings { message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl EngineError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::AlreadyExists => Self::Collision { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an action log error.
    pub fn action_log(message: impl std::fmt::Display) -> Self {
        Self::ActionLog {
            message: message.to_string(),
        }
    }

    /// Create a trash error.
    pub fn trash(message: impl std::fmt::Display) -> Self {
        Self::Trash {
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "INVALID_NAME",
            Self::RootViolation { .. } => "ROOT_VIOLATION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Collision { .. } => "COLLISION",
            Self::Io { .. } => "IO_ERROR",
            Self::MoveIntoSelf { .. } => "MOVE_INTO_SELF",
            Self::NotADirectory { .. } => "NOT_A_DIRECTORY",
            Self::DirectoryNotEmpty { .. } => "DIRECTORY_NOT_EMPTY",
            Self::NothingToUndo => "NOTHING_TO_UNDO",
            Self::RestoreConflict { .. } => "RESTORE_CONFLICT",
            Self::ActionLog { .. } => "ACTION_LOG_ERROR",
            Self::Trash { .. } => "TRASH_ERROR",
            Self::Settings { .. } => "SETTINGS_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
        }
    }
}

impl Serialize for EngineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("EngineError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_io() {
        let err = EngineError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(matches!(err, EngineError::NotFound { .. }));

        let err = EngineError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists"),
        );
        assert!(matches!(err, EngineError::Collision { .. }));

        let err = EngineError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn test_error_serializes_code_and_message() {
        let err = EngineError::Collision {
            path: PathBuf::from("/a/new.txt"),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "COLLISION");
        assert!(json["message"].as_str().unwrap().contains("/a/new.txt"));
    }

    #[test]
    fn test_trash_error_code() {
        assert_eq!(EngineError::trash("corrupt record").code(), "TRASH_ERROR");
    }
}
