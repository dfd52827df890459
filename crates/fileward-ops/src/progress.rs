//! Progress reporting for running batches.

use std::path::PathBuf;

use fileward_core::ActionKind;
use serde::{Deserialize, Serialize};

/// Progress of one batch, emitted after every item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// The batch being executed.
    pub batch_id: String,
    /// The kind of action the batch performs.
    pub action: ActionKind,
    /// Total number of items in the batch.
    pub total: usize,
    /// Items finished so far, successful or not.
    pub completed: usize,
    /// Items that failed so far.
    pub failed: usize,
    /// The item that was just processed.
    pub current: Option<PathBuf>,
}

impl BatchProgress {
    /// Create a tracker for a batch of `total` items.
    pub fn new(batch_id: impl Into<String>, action: ActionKind, total: usize) -> Self {
        Self {
            batch_id: batch_id.into(),
            action,
            total,
            completed: 0,
            failed: 0,
            current: None,
        }
    }

    /// Record the outcome of one item.
    pub fn record(&mut self, path: PathBuf, success: bool) {
        self.completed += 1;
        if !success {
            self.failed += 1;
        }
        self.current = Some(path);
    }
}
