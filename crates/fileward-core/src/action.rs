//! Action log records and operation results.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// The kind of mutation recorded in the action log.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    CreateDir,
    Rename,
    Move,
    Delete,
    Undo,
}

impl ActionKind {
    /// Whether entries of this kind can be reversed by undo.
    pub fn is_reversible(&self) -> bool {
        !matches!(self, Self::Undo)
    }
}

/// Outcome of a single logged item.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Success,
    Error,
}

/// A persisted, immutable action log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    /// Monotonic id assigned by the log.
    pub id: i64,
    /// RFC 3339 UTC time the entry was written.
    pub timestamp: String,
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_path: Option<String>,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Shared by every entry of one user action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// For UNDO entries, the batch that was reversed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_of: Option<String>,
}

impl ActionLogEntry {
    /// Whether this entry records a successful outcome.
    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

/// An action log row that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLogEntry {
    /// Defaults to the time of writing when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub action: ActionKind,
    #[serde(default)]
    pub src_path: Option<String>,
    #[serde(default)]
    pub dst_path: Option<String>,
    pub status: ActionStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub undo_of: Option<String>,
}

impl NewLogEntry {
    /// Start an entry for `action` in `batch_id`.
    pub fn new(action: ActionKind, status: ActionStatus, batch_id: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            action,
            src_path: None,
            dst_path: None,
            status,
            message: None,
            batch_id: Some(batch_id.into()),
            undo_of: None,
        }
    }

    pub fn src(mut self, path: impl Into<String>) -> Self {
        self.src_path = Some(path.into());
        self
    }

    pub fn dst(mut self, path: impl Into<String>) -> Self {
        self.dst_path = Some(path.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn undo_of(mut self, batch_id: impl Into<String>) -> Self {
        self.undo_of = Some(batch_id.into());
        self
    }
}

/// Per-item outcome inside a [`BatchResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub path: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregate outcome of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// True when no item failed.
    pub success: bool,
    /// Items that succeeded.
    pub processed: usize,
    /// Items that failed.
    pub failed: usize,
    pub batch_id: String,
    pub results: Vec<BatchItemResult>,
}

impl BatchResult {
    /// Fold per-item results into an aggregate.
    pub fn from_items(batch_id: impl Into<String>, results: Vec<BatchItemResult>) -> Self {
        let (processed, failed) = results.iter().fold((0, 0), |(ok, err), item| {
            if item.success {
                (ok + 1, err)
            } else {
                (ok, err + 1)
            }
        });

        Self {
            success: failed == 0,
            processed,
            failed,
            batch_id: batch_id.into(),
            results,
        }
    }

    /// Human-readable summary.
    pub fn summary(&self, action: ActionKind) -> String {
        let verb = match action {
            ActionKind::CreateDir => "Created",
            ActionKind::Rename => "Renamed",
            ActionKind::Move => "Moved",
            ActionKind::Delete => "Trashed",
            ActionKind::Undo => "Restored",
        };
        if self.failed == 0 {
            format!("{} {} items", verb, self.processed)
        } else {
            format!("{} {} items, {} failed", verb, self.processed, self.failed)
        }
    }
}

/// Outcome of one undo invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoResult {
    /// True when at least one item was restored.
    pub success: bool,
    /// The kind of action that was reversed.
    pub action: ActionKind,
    pub items_restored: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UndoResult {
    /// The result reported when no batch is eligible.
    pub fn nothing_to_undo() -> Self {
        Self {
            success: false,
            action: ActionKind::Undo,
            items_restored: 0,
            message: Some("Nothing to undo".to_string()),
        }
    }
}

/// Result of `make_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirResult {
    pub success: bool,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of `rename_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameResult {
    pub success: bool,
    pub old_path: String,
    pub new_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_action_kind_names() {
        assert_eq!(ActionKind::CreateDir.to_string(), "CREATE_DIR");
        assert_eq!(ActionKind::from_str("MOVE").unwrap(), ActionKind::Move);
        assert_eq!(
            serde_json::to_string(&ActionKind::Undo).unwrap(),
            "\"UNDO\""
        );
        assert!(!ActionKind::Undo.is_reversible());
        assert!(ActionKind::Delete.is_reversible());
    }

    #[test]
    fn test_batch_result_fold() {
        let items = vec![
            BatchItemResult {
                path: "/a".into(),
                success: true,
                message: None,
            },
            BatchItemResult {
                path: "/b".into(),
                success: false,
                message: Some("Destination already exists".into()),
            },
            BatchItemResult {
                path: "/c".into(),
                success: true,
                message: None,
            },
        ];
        let result = BatchResult::from_items("batch-1", items);
        assert_eq!(result.processed, 2);
        assert_eq!(result.failed, 1);
        assert!(!result.success);
        assert_eq!(result.summary(ActionKind::Move), "Moved 2 items, 1 failed");
    }

    #[test]
    fn test_new_log_entry_deserializes_without_id() {
        let json = r#"{"action":"RENAME","src_path":"/a","dst_path":"/b","status":"SUCCESS","batch_id":"x"}"#;
        let entry: NewLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.action, ActionKind::Rename);
        assert!(entry.timestamp.is_none());
        assert!(entry.undo_of.is_none());
    }

    #[test]
    fn test_nothing_to_undo() {
        let result = UndoResult::nothing_to_undo();
        assert!(!result.success);
        assert_eq!(result.items_restored, 0);
    }
}
