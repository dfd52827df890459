//! File operations engine for fileward.
//!
//! This crate performs filesystem mutations confined to a set of allowed
//! roots. Multi-item operations run as batches that continue past per-item
//! failures, deletions go to a recoverable trash, every outcome is recorded
//! in an append-only action log, and the most recent batch can be undone.

mod conflict;
mod engine;
mod executor;
mod listing;
mod log;
mod move_op;
mod operation;
mod progress;
mod search;
mod trash;
mod undo;

pub use conflict::{check_move_target, path_occupied, unique_path};
pub use engine::Engine;
pub use executor::{BatchExecutor, BatchOutcome, ItemOutcome};
pub use listing::{list_dir, stat};
pub use log::ActionLog;
pub use move_op::move_item;
pub use operation::FileOperation;
pub use progress::BatchProgress;
pub use search::{Search, SearchIter};
pub use trash::{TrashManager, TrashRecord};
pub use undo::UndoController;

/// Default channel buffer size for progress updates and search streams.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
