//! Single-step undo driven by the action log.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fileward_core::{
    ActionKind, ActionLogEntry, ActionStatus, EngineError, EngineResult, NewLogEntry, RootGuard,
    UndoResult,
};
use itertools::Itertools;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::conflict::path_occupied;
use crate::executor::{path_string, run_blocking};
use crate::log::ActionLog;
use crate::move_op::move_item;
use crate::trash::TrashManager;

/// The inverse of one logged item.
#[derive(Debug, Clone)]
enum Inverse {
    /// Remove a directory that was created, if still empty.
    RemoveDir { path: PathBuf },
    /// Move a renamed or moved item back.
    MoveBack { current: PathBuf, original: PathBuf },
    /// Bring a trashed item back.
    Restore { staged: PathBuf, original: PathBuf },
}

impl Inverse {
    /// Plan the inverse of `entry`, checking both ends against the guard.
    fn plan(entry: &ActionLogEntry, guard: &RootGuard) -> EngineResult<Self> {
        match entry.action {
            ActionKind::CreateDir => Ok(Self::RemoveDir {
                path: guard.check(required(entry, &entry.dst_path)?)?,
            }),
            ActionKind::Rename | ActionKind::Move => Ok(Self::MoveBack {
                current: guard.check(required(entry, &entry.dst_path)?)?,
                original: guard.check(required(entry, &entry.src_path)?)?,
            }),
            ActionKind::Delete => Ok(Self::Restore {
                staged: PathBuf::from(required(entry, &entry.dst_path)?),
                original: guard.check(required(entry, &entry.src_path)?)?,
            }),
            ActionKind::Undo => Err(EngineError::NothingToUndo),
        }
    }

    fn logged_paths(&self) -> (&Path, Option<&Path>) {
        match self {
            Self::RemoveDir { path } => (path, None),
            Self::MoveBack { current, original } => (current, Some(original)),
            Self::Restore { staged, original } => (staged, Some(original)),
        }
    }

    fn apply(&self, trash: &TrashManager) -> EngineResult<()> {
        match self {
            Self::RemoveDir { path } => {
                let mut children = fs::read_dir(path).map_err(|e| EngineError::io(path, e))?;
                if children.next().is_some() {
                    return Err(EngineError::DirectoryNotEmpty { path: path.clone() });
                }
                fs::remove_dir(path).map_err(|e| EngineError::io(path, e))
            }
            Self::MoveBack { current, original } => {
                if !path_occupied(current) {
                    return Err(EngineError::NotFound {
                        path: current.clone(),
                    });
                }
                if path_occupied(original) {
                    return Err(EngineError::RestoreConflict {
                        path: original.clone(),
                    });
                }
                if let Some(parent) = original.parent() {
                    fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
                }
                move_item(current, original).map_err(|e| EngineError::io(current, e))
            }
            Self::Restore { staged, original } => trash.restore(staged, original).map(|_| ()),
        }
    }
}

fn required<'a>(entry: &ActionLogEntry, field: &'a Option<String>) -> EngineResult<&'a str> {
    field.as_deref().ok_or_else(|| {
        EngineError::action_log(format!(
            "{} entry {} is missing a path",
            entry.action, entry.id
        ))
    })
}

/// Reverses the most recent eligible batch.
///
/// Runs are serialized, so two concurrent calls can never both claim the
/// same batch.
#[derive(Debug)]
pub struct UndoController {
    log: ActionLog,
    trash: Arc<TrashManager>,
    running: Mutex<()>,
}

impl UndoController {
    pub fn new(log: ActionLog, trash: Arc<TrashManager>) -> Self {
        Self {
            log,
            trash,
            running: Mutex::new(()),
        }
    }

    /// Undo the most recent batch that has not been undone yet.
    ///
    /// Items are reversed newest first. Each attempt that reaches the
    /// filesystem is logged as an UNDO entry pointing at the original batch,
    /// which consumes it. Items whose paths fall outside `guard` are skipped
    /// without logging.
    pub async fn undo_last(&self, guard: &RootGuard) -> EngineResult<UndoResult> {
        let _running = self.running.lock().await;

        let log = self.log.clone();
        let candidate = run_blocking(move || log.undo_candidate()).await?;

        let Some((batch_id, entries)) = candidate else {
            tracing::debug!("nothing to undo");
            return Ok(UndoResult::nothing_to_undo());
        };

        let eligible: Vec<ActionLogEntry> = entries
            .into_iter()
            .filter(|entry| entry.is_success() && entry.action.is_reversible())
            .rev()
            .collect();

        let action = eligible
            .iter()
            .map(|entry| entry.action)
            .counts()
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(action, _)| action)
            .unwrap_or(ActionKind::Undo);

        let undo_batch = Uuid::new_v4().to_string();
        let total = eligible.len();
        let mut restored = 0;
        let mut first_failure: Option<String> = None;

        for entry in eligible {
            let outcome = match Inverse::plan(&entry, guard) {
                Ok(inverse) => self.run(inverse, &batch_id, &undo_batch).await,
                Err(e) => {
                    tracing::warn!(entry = entry.id, error = %e, "undo item rejected");
                    Err(e)
                }
            };

            match outcome {
                Ok(()) => restored += 1,
                Err(e) => {
                    first_failure.get_or_insert_with(|| e.to_string());
                }
            }
        }

        tracing::info!(
            %batch_id,
            %undo_batch,
            %action,
            restored,
            total,
            "undo finished"
        );

        let mut message = format!("Restored {restored} of {total} item(s)");
        if let Some(failure) = first_failure {
            message.push_str(": ");
            message.push_str(&failure);
        }

        Ok(UndoResult {
            success: restored > 0,
            action,
            items_restored: restored,
            message: Some(message),
        })
    }

    async fn run(&self, inverse: Inverse, batch_id: &str, undo_batch: &str) -> EngineResult<()> {
        let log = self.log.clone();
        let trash = Arc::clone(&self.trash);
        let batch_id = batch_id.to_string();
        let undo_batch = undo_batch.to_string();

        run_blocking(move || {
            let result = inverse.apply(&trash);

            let (src, dst) = inverse.logged_paths();
            let status = if result.is_ok() {
                ActionStatus::Success
            } else {
                ActionStatus::Error
            };
            let mut entry = NewLogEntry::new(ActionKind::Undo, status, undo_batch)
                .undo_of(batch_id)
                .src(path_string(src));
            if let Some(dst) = dst {
                entry = entry.dst(path_string(dst));
            }
            if let Err(e) = &result {
                tracing::warn!(path = %src.display(), error = %e, "undo item failed");
                entry = entry.message(e.to_string());
            }

            match (log.append(entry), result) {
                (Ok(_), result) => result,
                (Err(log_err), Ok(())) => {
                    tracing::warn!(path = %src.display(), error = %log_err, "action log write failed");
                    Err(log_err)
                }
                (Err(log_err), Err(e)) => {
                    tracing::warn!(path = %src.display(), error = %log_err, "action log write failed");
                    Err(e)
                }
            }
        })
        .await
    }
}
