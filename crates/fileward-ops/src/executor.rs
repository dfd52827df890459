//! Batch executor: runs one operation over its items and logs every outcome.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fileward_core::{
    validate_name, ActionKind, ActionStatus, BatchItemResult, BatchResult, EngineError,
    EngineResult, NewLogEntry, RootGuard,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::conflict::{check_move_target, path_occupied};
use crate::log::ActionLog;
use crate::move_op::move_item;
use crate::operation::FileOperation;
use crate::progress::BatchProgress;
use crate::trash::TrashManager;
use crate::OPERATION_CHANNEL_SIZE;

/// Outcome of one item of a batch.
#[derive(Debug)]
pub struct ItemOutcome {
    /// The item as the caller named it (normalized when it passed the guard).
    pub path: PathBuf,
    /// Where the item ended up, or why it failed.
    pub result: EngineResult<PathBuf>,
}

impl ItemOutcome {
    fn to_item_result(&self) -> BatchItemResult {
        BatchItemResult {
            path: path_string(&self.path),
            success: self.result.is_ok(),
            message: self.result.as_ref().err().map(ToString::to_string),
        }
    }
}

/// Everything a batch produced, with the item errors still typed.
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub action: ActionKind,
    pub items: Vec<ItemOutcome>,
}

impl BatchOutcome {
    /// The caller-facing aggregate.
    pub fn to_result(&self) -> BatchResult {
        BatchResult::from_items(
            self.batch_id.clone(),
            self.items.iter().map(ItemOutcome::to_item_result).collect(),
        )
    }

    /// The outcome of a single-item batch.
    pub fn into_single(self) -> EngineResult<PathBuf> {
        self.items
            .into_iter()
            .next()
            .map(|item| item.result)
            .unwrap_or_else(|| {
                Err(EngineError::InvalidConfig {
                    message: "batch produced no items".to_string(),
                })
            })
    }
}

/// One filesystem change that passed every precondition.
#[derive(Debug, Clone)]
enum Step {
    CreateDir { target: PathBuf },
    Rename { source: PathBuf, target: PathBuf },
    Move { source: PathBuf, target: PathBuf },
    Delete { target: PathBuf },
}

impl Step {
    fn action(&self) -> ActionKind {
        match self {
            Self::CreateDir { .. } => ActionKind::CreateDir,
            Self::Rename { .. } => ActionKind::Rename,
            Self::Move { .. } => ActionKind::Move,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    /// The path reported back for this item.
    fn item_path(&self) -> &Path {
        match self {
            Self::CreateDir { target } | Self::Delete { target } => target,
            Self::Rename { source, .. } | Self::Move { source, .. } => source,
        }
    }

    /// Source and destination as recorded when the step fails.
    fn requested_paths(&self) -> (Option<&Path>, Option<&Path>) {
        match self {
            Self::CreateDir { target } => (None, Some(target)),
            Self::Rename { source, target } | Self::Move { source, target } => {
                (Some(source), Some(target))
            }
            Self::Delete { target } => (Some(target), None),
        }
    }
}

/// An item of the plan: either runnable, or already rejected by the guard.
#[derive(Debug)]
enum Planned {
    Run(Step),
    Rejected { path: PathBuf, error: EngineError },
}

/// Applies operations item by item, in input order.
///
/// Every item that reaches the filesystem gets exactly one action log entry.
/// Items rejected by the root guard are reported as failures but never
/// logged, since nothing was attempted.
#[derive(Debug)]
pub struct BatchExecutor {
    log: ActionLog,
    trash: Arc<TrashManager>,
    progress: broadcast::Sender<BatchProgress>,
}

impl BatchExecutor {
    pub fn new(log: ActionLog, trash: Arc<TrashManager>) -> Self {
        let (progress, _) = broadcast::channel(OPERATION_CHANNEL_SIZE);
        Self {
            log,
            trash,
            progress,
        }
    }

    /// Receive a progress update after every item of every batch.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    /// Execute `operation` as one batch.
    ///
    /// Returns an error only when a batch-level precondition fails (invalid
    /// name, root violation of the single target, unusable move destination);
    /// nothing is touched or logged in that case. Per-item failures are
    /// reported inside the outcome.
    pub async fn execute(
        &self,
        operation: FileOperation,
        guard: &RootGuard,
    ) -> EngineResult<BatchOutcome> {
        let action = operation.action();
        let total = operation.item_count();
        let batch_id = Uuid::new_v4().to_string();
        let plan = plan(operation, guard).await?;

        tracing::debug!(%batch_id, %action, items = total, "starting batch");

        let mut progress = BatchProgress::new(&batch_id, action, total);
        let mut items = Vec::with_capacity(total);

        for planned in plan {
            let outcome = match planned {
                Planned::Run(step) => self.run_step(&batch_id, step).await,
                Planned::Rejected { path, error } => {
                    tracing::warn!(path = %path.display(), error = %error, "item rejected");
                    ItemOutcome {
                        path,
                        result: Err(error),
                    }
                }
            };

            progress.record(outcome.path.clone(), outcome.result.is_ok());
            // No subscribers is fine.
            let _ = self.progress.send(progress.clone());
            items.push(outcome);
        }

        tracing::info!(
            %batch_id,
            %action,
            completed = progress.completed - progress.failed,
            failed = progress.failed,
            "batch finished"
        );

        Ok(BatchOutcome {
            batch_id,
            action,
            items,
        })
    }

    async fn run_step(&self, batch_id: &str, step: Step) -> ItemOutcome {
        let path = step.item_path().to_path_buf();
        let log = self.log.clone();
        let trash = Arc::clone(&self.trash);
        let batch_id = batch_id.to_string();

        match tokio::task::spawn_blocking(move || apply_and_log(&log, &trash, &batch_id, step))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => ItemOutcome {
                result: Err(join_error(e)),
                path,
            },
        }
    }
}

/// Run blocking filesystem or database work off the async threads.
pub(crate) async fn run_blocking<T, F>(f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(join_error)?
}

pub(crate) fn join_error(e: tokio::task::JoinError) -> EngineError {
    EngineError::Io {
        path: PathBuf::new(),
        source: std::io::Error::other(e),
    }
}

/// Check preconditions and turn an operation into per-item steps.
async fn plan(operation: FileOperation, guard: &RootGuard) -> EngineResult<Vec<Planned>> {
    match operation {
        FileOperation::CreateDirectory { parent, name } => {
            validate_name(&name)?;
            let parent = guard.check(&parent)?;
            Ok(vec![Planned::Run(Step::CreateDir {
                target: parent.join(name),
            })])
        }
        FileOperation::Rename { source, new_name } => {
            validate_name(&new_name)?;
            let source = guard.check_below_root(&source)?;
            let target = match source.parent() {
                Some(parent) => parent.join(&new_name),
                None => return Err(EngineError::RootViolation { path: source }),
            };
            Ok(vec![Planned::Run(Step::Rename { source, target })])
        }
        FileOperation::Move {
            sources,
            destination,
        } => {
            if sources.is_empty() {
                return Ok(Vec::new());
            }
            let destination = guard.check(&destination)?;
            ensure_directory(destination.clone()).await?;

            Ok(sources
                .into_iter()
                .map(|source| match guarded_source(guard, &source) {
                    Ok((source, name)) => Planned::Run(Step::Move {
                        target: destination.join(name),
                        source,
                    }),
                    Err(error) => Planned::Rejected {
                        path: source,
                        error,
                    },
                })
                .collect())
        }
        FileOperation::Delete { targets } => Ok(targets
            .into_iter()
            .map(|target| match guarded_source(guard, &target) {
                Ok((target, _)) => Planned::Run(Step::Delete { target }),
                Err(error) => Planned::Rejected {
                    path: target,
                    error,
                },
            })
            .collect()),
    }
}

/// Guard a move or delete source and split off its file name.
fn guarded_source(guard: &RootGuard, path: &Path) -> EngineResult<(PathBuf, PathBuf)> {
    let path = guard.check_below_root(path)?;
    match path.file_name() {
        Some(name) => {
            let name = PathBuf::from(name);
            Ok((path, name))
        }
        None => Err(EngineError::RootViolation { path }),
    }
}

async fn ensure_directory(path: PathBuf) -> EngineResult<()> {
    run_blocking(move || {
        let metadata = fs::metadata(&path).map_err(|e| EngineError::io(&path, e))?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(EngineError::NotADirectory { path })
        }
    })
    .await
}

/// Perform one step and append its log entry.
///
/// A step whose log entry cannot be written is reported as failed even though
/// the filesystem change happened.
fn apply_and_log(log: &ActionLog, trash: &TrashManager, batch_id: &str, step: Step) -> ItemOutcome {
    let action = step.action();
    let path = step.item_path().to_path_buf();

    match apply(&step, trash, batch_id) {
        Ok(dst) => {
            let mut entry = NewLogEntry::new(action, ActionStatus::Success, batch_id);
            if let (Some(src), _) = step.requested_paths() {
                entry = entry.src(path_string(src));
            }
            entry = entry.dst(path_string(&dst));

            match log.append(entry) {
                Ok(_) => {
                    tracing::debug!(%action, path = %path.display(), dst = %dst.display(), "item done");
                    ItemOutcome {
                        path,
                        result: Ok(dst),
                    }
                }
                Err(e) => {
                    tracing::warn!(%action, path = %path.display(), error = %e, "action log write failed");
                    ItemOutcome {
                        path,
                        result: Err(e),
                    }
                }
            }
        }
        Err(error) => {
            tracing::warn!(%action, path = %path.display(), error = %error, "item failed");

            let (src, dst) = step.requested_paths();
            let mut entry = NewLogEntry::new(action, ActionStatus::Error, batch_id)
                .message(error.to_string());
            if let Some(src) = src {
                entry = entry.src(path_string(src));
            }
            if let Some(dst) = dst {
                entry = entry.dst(path_string(dst));
            }
            if let Err(e) = log.append(entry) {
                tracing::warn!(%action, path = %path.display(), error = %e, "action log write failed");
            }

            ItemOutcome {
                path,
                result: Err(error),
            }
        }
    }
}

/// Perform the filesystem change of one step and return where the item ended up.
fn apply(step: &Step, trash: &TrashManager, batch_id: &str) -> EngineResult<PathBuf> {
    match step {
        Step::CreateDir { target } => {
            if path_occupied(target) {
                return Err(EngineError::Collision {
                    path: target.clone(),
                });
            }
            fs::create_dir(target).map_err(|e| EngineError::io(target, e))?;
            Ok(target.clone())
        }
        Step::Rename { source, target } => {
            fs::symlink_metadata(source).map_err(|e| EngineError::io(source, e))?;
            if path_occupied(target) {
                return Err(EngineError::Collision {
                    path: target.clone(),
                });
            }
            fs::rename(source, target).map_err(|e| EngineError::io(source, e))?;
            Ok(target.clone())
        }
        Step::Move { source, target } => {
            fs::symlink_metadata(source).map_err(|e| EngineError::io(source, e))?;
            check_move_target(source, target)?;
            move_item(source, target).map_err(|e| EngineError::io(source, e))?;
            Ok(target.clone())
        }
        Step::Delete { target } => Ok(trash.stage(target, batch_id)?.staged_path),
    }
}

pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        guard: RootGuard,
        log: ActionLog,
        executor: BatchExecutor,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        let log = ActionLog::open_in_memory().unwrap();
        let trash = Arc::new(TrashManager::new(dir.path().join("trash")));
        let executor = BatchExecutor::new(log.clone(), trash);
        Fixture {
            guard: RootGuard::new([&root]).unwrap(),
            _dir: dir,
            root,
            log,
            executor,
        }
    }

    #[tokio::test]
    async fn test_create_dir_logs_success() {
        let f = fixture();
        let outcome = f
            .executor
            .execute(FileOperation::create_directory(&f.root, "photos"), &f.guard)
            .await
            .unwrap();

        let result = outcome.to_result();
        assert!(result.success);
        assert_eq!(result.processed, 1);
        assert!(f.root.join("photos").is_dir());

        let entries = f.log.batch(&result.batch_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActionKind::CreateDir);
        assert_eq!(entries[0].src_path, None);
    }

    #[tokio::test]
    async fn test_invalid_name_is_batch_error_without_log() {
        let f = fixture();
        let err = f
            .executor
            .execute(FileOperation::create_directory(&f.root, "a:b"), &f.guard)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidName { .. }));
        assert!(f.log.recent(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_continues_past_failures() {
        let f = fixture();
        let dest = f.root.join("dest");
        fs::create_dir(&dest).unwrap();
        for name in ["a", "b", "c"] {
            fs::write(f.root.join(name), name).unwrap();
        }
        fs::write(dest.join("b"), "existing").unwrap();

        let sources = vec![f.root.join("a"), f.root.join("b"), f.root.join("c")];
        let outcome = f
            .executor
            .execute(FileOperation::move_to(sources, &dest), &f.guard)
            .await
            .unwrap();

        let result = outcome.to_result();
        assert_eq!(result.processed, 2);
        assert_eq!(result.failed, 1);
        assert!(!result.results[1].success);
        assert!(result.results[1].message.as_deref().unwrap().contains("already exists"));
        assert_eq!(fs::read_to_string(dest.join("b")).unwrap(), "existing");
        assert!(f.root.join("b").exists());

        let statuses: Vec<_> = f
            .log
            .batch(&result.batch_id)
            .unwrap()
            .into_iter()
            .map(|e| e.status)
            .collect();
        assert_eq!(
            statuses,
            [ActionStatus::Success, ActionStatus::Error, ActionStatus::Success]
        );
    }

    #[tokio::test]
    async fn test_out_of_root_item_is_rejected_not_logged() {
        let f = fixture();
        fs::write(f.root.join("inside"), "x").unwrap();
        let outside = f.root.join("..").join("outside");

        let outcome = f
            .executor
            .execute(
                FileOperation::delete(vec![outside, f.root.join("inside")]),
                &f.guard,
            )
            .await
            .unwrap();

        assert!(matches!(
            outcome.items[0].result,
            Err(EngineError::RootViolation { .. })
        ));
        let result = outcome.to_result();
        assert_eq!((result.processed, result.failed), (1, 1));
        assert_eq!(f.log.batch(&result.batch_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_move_into_self_fails_item() {
        let f = fixture();
        let folder = f.root.join("folder");
        fs::create_dir_all(folder.join("child")).unwrap();

        let outcome = f
            .executor
            .execute(
                FileOperation::move_to(vec![folder.clone()], folder.join("child")),
                &f.guard,
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome.items[0].result,
            Err(EngineError::MoveIntoSelf { .. })
        ));
        assert!(folder.join("child").is_dir());
    }

    #[tokio::test]
    async fn test_move_to_missing_destination_is_error() {
        let f = fixture();
        fs::write(f.root.join("a"), "a").unwrap();
        let err = f
            .executor
            .execute(
                FileOperation::move_to(vec![f.root.join("a")], f.root.join("nowhere")),
                &f.guard,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        assert!(f.log.recent(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_delete_is_empty_result() {
        let f = fixture();
        let result = f
            .executor
            .execute(FileOperation::delete(vec![]), &f.guard)
            .await
            .unwrap()
            .to_result();
        assert!(result.success);
        assert_eq!((result.processed, result.failed), (0, 0));
    }

    #[tokio::test]
    async fn test_progress_is_broadcast_per_item() {
        let f = fixture();
        fs::write(f.root.join("one"), "1").unwrap();
        fs::write(f.root.join("two"), "2").unwrap();
        let mut rx = f.executor.subscribe();

        f.executor
            .execute(
                FileOperation::delete(vec![f.root.join("one"), f.root.join("two")]),
                &f.guard,
            )
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.completed, 1);
        assert_eq!(second.completed, 2);
        assert_eq!(second.total, 2);
        assert_eq!(second.current, Some(f.root.join("two")));
    }
}
