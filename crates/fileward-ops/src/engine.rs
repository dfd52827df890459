//! The engine facade: every command the presentation layer calls.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use fileward_core::{
    normalize_path, ActionLogEntry, BatchResult, DirResult, EngineConfig, EngineError,
    EngineResult, FileEntry, FileStat, NewLogEntry, RenameResult, RootGuard, Settings,
    UndoResult,
};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::ReceiverStream;

use crate::executor::{path_string, run_blocking, BatchExecutor};
use crate::listing;
use crate::log::ActionLog;
use crate::operation::FileOperation;
use crate::progress::BatchProgress;
use crate::search::Search;
use crate::trash::{TrashManager, TrashRecord};
use crate::undo::UndoController;

/// File-operation engine.
///
/// Owns the allowed roots, the action log and the trash. Mutations are
/// rejected until roots are configured; reads are unrestricted while no
/// roots are set and confined to the roots afterwards.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    guard: RwLock<Arc<RootGuard>>,
    settings: Mutex<Settings>,
    log: ActionLog,
    trash: Arc<TrashManager>,
    executor: BatchExecutor,
    undo: UndoController,
}

impl Engine {
    /// Open the engine, loading persisted roots and favorites and the action
    /// log from the locations in `config`.
    ///
    /// Relative locations in `config` are anchored to the current directory.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        let config = config.into_absolute()?;
        let settings = Settings::load(&config.settings_file());
        let log = ActionLog::open(&config.log_file())?;
        let trash = Arc::new(TrashManager::new(config.trash_root()));

        let guard = match guard_for(&settings.roots, trash.root()) {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring persisted roots");
                RootGuard::empty()
            }
        };

        tracing::debug!(
            data_dir = %config.data_dir.display(),
            roots = guard.roots().len(),
            "engine opened"
        );

        Ok(Self {
            executor: BatchExecutor::new(log.clone(), Arc::clone(&trash)),
            undo: UndoController::new(log.clone(), Arc::clone(&trash)),
            guard: RwLock::new(Arc::new(guard)),
            settings: Mutex::new(settings),
            config,
            log,
            trash,
        })
    }

    /// The configuration in use, with every location absolute.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of the current guard.
    fn guard(&self) -> Arc<RootGuard> {
        match self.guard.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// The currently allowed roots.
    pub fn allowed_roots(&self) -> Vec<PathBuf> {
        self.guard().roots().to_vec()
    }

    /// Normalize a path for a read-only command.
    fn read_path(&self, path: &Path) -> EngineResult<PathBuf> {
        let guard = self.guard();
        if guard.is_empty() {
            Ok(normalize_path(path))
        } else {
            guard.check(path)
        }
    }

    /// Receive progress updates for every batch.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchProgress> {
        self.executor.subscribe()
    }

    pub async fn list_dir(&self, path: impl AsRef<Path>) -> EngineResult<Vec<FileEntry>> {
        let path = self.read_path(path.as_ref())?;
        run_blocking(move || listing::list_dir(&path)).await
    }

    pub async fn stat_path(&self, path: impl AsRef<Path>) -> EngineResult<FileStat> {
        let path = self.read_path(path.as_ref())?;
        run_blocking(move || listing::stat(&path)).await
    }

    /// Create directory `name` inside `base`.
    pub async fn make_dir(&self, base: impl AsRef<Path>, name: &str) -> EngineResult<DirResult> {
        let guard = self.guard();
        let outcome = self
            .executor
            .execute(
                FileOperation::create_directory(base.as_ref(), name),
                &guard,
            )
            .await?;
        let path = outcome.into_single()?;

        Ok(DirResult {
            success: true,
            path: path_string(&path),
            message: None,
        })
    }

    /// Rename `src` to `new_name` within its parent.
    pub async fn rename_path(
        &self,
        src: impl AsRef<Path>,
        new_name: &str,
    ) -> EngineResult<RenameResult> {
        let guard = self.guard();
        let outcome = self
            .executor
            .execute(FileOperation::rename(src.as_ref(), new_name), &guard)
            .await?;
        let old_path = outcome
            .items
            .first()
            .map(|item| path_string(&item.path))
            .unwrap_or_default();
        let new_path = outcome.into_single()?;

        Ok(RenameResult {
            success: true,
            old_path,
            new_path: path_string(&new_path),
            message: None,
        })
    }

    /// Move every path of `src_paths` into `dest_dir`.
    pub async fn move_paths(
        &self,
        src_paths: Vec<PathBuf>,
        dest_dir: impl AsRef<Path>,
    ) -> EngineResult<BatchResult> {
        let guard = self.guard();
        let outcome = self
            .executor
            .execute(FileOperation::move_to(src_paths, dest_dir.as_ref()), &guard)
            .await?;
        Ok(outcome.to_result())
    }

    /// Move every path of `paths` into the trash.
    pub async fn soft_delete(&self, paths: Vec<PathBuf>) -> EngineResult<BatchResult> {
        let guard = self.guard();
        let outcome = self
            .executor
            .execute(FileOperation::delete(paths), &guard)
            .await?;
        Ok(outcome.to_result())
    }

    pub async fn undo_last_action(&self) -> EngineResult<UndoResult> {
        let guard = self.guard();
        self.undo.undo_last(&guard).await
    }

    /// Every entry below `current_path` whose name contains `query`.
    pub async fn search(
        &self,
        current_path: impl AsRef<Path>,
        query: &str,
    ) -> EngineResult<Vec<FileEntry>> {
        let search = self.prepare_search(current_path.as_ref(), query)?;
        run_blocking(move || {
            let root = search.root();
            let metadata = std::fs::metadata(root).map_err(|e| EngineError::io(root, e))?;
            if !metadata.is_dir() {
                return Err(EngineError::NotADirectory {
                    path: root.to_path_buf(),
                });
            }
            Ok(search.iter().collect())
        })
        .await
    }

    /// Like [`search`](Self::search), but delivers matches as they are found.
    pub fn search_stream(
        &self,
        current_path: impl AsRef<Path>,
        query: &str,
    ) -> EngineResult<ReceiverStream<FileEntry>> {
        Ok(self.prepare_search(current_path.as_ref(), query)?.stream())
    }

    fn prepare_search(&self, root: &Path, query: &str) -> EngineResult<Search> {
        let root = self.read_path(root)?;
        Ok(Search::new(root, query)
            .include_hidden(self.config.search_include_hidden)
            .max_depth(self.config.search_max_depth))
    }

    /// Persisted favorites, or the platform's usual folders when none are set.
    pub async fn get_favorites(&self) -> EngineResult<Vec<PathBuf>> {
        let favorites = self.settings.lock().await.favorites.clone();
        if !favorites.is_empty() {
            return Ok(favorites);
        }

        run_blocking(|| {
            Ok([
                dirs::download_dir(),
                dirs::document_dir(),
                dirs::desktop_dir(),
                dirs::home_dir(),
            ]
            .into_iter()
            .flatten()
            .filter(|dir| dir.is_dir())
            .collect())
        })
        .await
    }

    /// Replace and persist the favorites.
    pub async fn set_favorites(&self, favorites: Vec<PathBuf>) -> EngineResult<()> {
        let mut settings = self.settings.lock().await;
        let mut updated = settings.clone();
        updated.favorites = favorites.into_iter().map(normalize_path).collect();

        let path = self.config.settings_file();
        let saved = updated.clone();
        run_blocking(move || saved.save(&path)).await?;

        *settings = updated;
        Ok(())
    }

    /// Replace the allowed roots wholesale and persist them.
    ///
    /// Roots must be absolute and must not overlap the trash. The new guard
    /// applies to every operation started afterwards.
    pub async fn set_allowed_roots(&self, roots: Vec<PathBuf>) -> EngineResult<()> {
        let guard = guard_for(&roots, self.trash.root())?;

        let mut settings = self.settings.lock().await;
        let mut updated = settings.clone();
        updated.roots = guard.roots().to_vec();

        let path = self.config.settings_file();
        let saved = updated.clone();
        run_blocking(move || saved.save(&path)).await?;

        *settings = updated;
        match self.guard.write() {
            Ok(mut current) => *current = Arc::new(guard),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(guard),
        }

        tracing::info!(roots = settings.roots.len(), "allowed roots replaced");
        Ok(())
    }

    /// The most recent `limit` action log entries, newest first.
    pub async fn get_recent_logs(&self, limit: usize) -> EngineResult<Vec<ActionLogEntry>> {
        let log = self.log.clone();
        run_blocking(move || log.recent(limit)).await
    }

    /// Every entry of one batch, oldest first.
    pub async fn get_batch_logs(&self, batch_id: &str) -> EngineResult<Vec<ActionLogEntry>> {
        let log = self.log.clone();
        let batch_id = batch_id.to_string();
        run_blocking(move || log.batch(&batch_id)).await
    }

    /// Append a caller-supplied entry to the action log.
    pub async fn db_log(&self, entry: NewLogEntry) -> EngineResult<i64> {
        let log = self.log.clone();
        run_blocking(move || log.append(entry)).await
    }

    /// Everything currently staged in the trash.
    pub async fn trash_contents(&self) -> EngineResult<Vec<TrashRecord>> {
        let trash = Arc::clone(&self.trash);
        run_blocking(move || trash.list()).await
    }
}

/// Build a guard for `roots`, refusing roots that overlap the trash.
fn guard_for(roots: &[PathBuf], trash_root: &Path) -> EngineResult<RootGuard> {
    let guard = RootGuard::new(roots)?;
    if guard.overlaps(trash_root) {
        return Err(EngineError::InvalidConfig {
            message: format!(
                "allowed roots must not overlap the trash at {}",
                trash_root.display()
            ),
        });
    }
    Ok(guard)
}
