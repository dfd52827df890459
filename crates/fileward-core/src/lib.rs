//! Core types for fileward.
//!
//! This crate provides the data structures shared by the engine and its
//! callers: listing records, action log rows, batch and undo results, the
//! error taxonomy, root containment checks, name validation and
//! configuration.

mod action;
mod config;
mod entry;
mod error;
mod guard;
mod name;

pub use action::{
    ActionKind, ActionLogEntry, ActionStatus, BatchItemResult, BatchResult, DirResult,
    NewLogEntry, RenameResult, UndoResult,
};
pub use config::{EngineConfig, EngineConfigBuilder, Settings};
pub use entry::{format_time, FileEntry, FileStat};
pub use error::{EngineError, EngineResult};
pub use guard::{is_allowed, normalize_path, RootGuard};
pub use name::{is_valid_name, validate_name, MAX_NAME_LEN, RESERVED_CHARS};
