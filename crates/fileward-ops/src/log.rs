//! Append-only action log backed by SQLite.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use fileward_core::{ActionKind, ActionLogEntry, ActionStatus, EngineError, EngineResult, NewLogEntry};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS action_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        action TEXT NOT NULL,
        src_path TEXT,
        dst_path TEXT,
        status TEXT NOT NULL,
        message TEXT,
        batch_id TEXT,
        undo_of TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_action_logs_batch ON action_logs (batch_id);
    CREATE INDEX IF NOT EXISTS idx_action_logs_undo_of ON action_logs (undo_of);
";

const COLUMNS: &str =
    "id, timestamp, action, src_path, dst_path, status, message, batch_id, undo_of";

/// Durable record of every mutation.
///
/// Rows are only ever inserted. Cloning shares the underlying connection.
#[derive(Debug, Clone)]
pub struct ActionLog {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLog {
    /// Open (or create) the log database at `path`.
    pub fn open(path: &Path) -> EngineResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        let conn = Connection::open(path).map_err(EngineError::action_log)?;
        Self::with_connection(conn)
    }

    /// Open a log that lives only as long as this value.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory().map_err(EngineError::action_log)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> EngineResult<Self> {
        conn.execute_batch(SCHEMA).map_err(EngineError::action_log)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> EngineResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EngineError::action_log("action log lock poisoned"))
    }

    /// Append one entry and return its id.
    pub fn append(&self, entry: NewLogEntry) -> EngineResult<i64> {
        let timestamp = entry.timestamp.unwrap_or_else(|| Utc::now().to_rfc3339());
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO action_logs (timestamp, action, src_path, dst_path, status, message, batch_id, undo_of)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                timestamp,
                entry.action.as_ref(),
                entry.src_path,
                entry.dst_path,
                entry.status.as_ref(),
                entry.message,
                entry.batch_id,
                entry.undo_of,
            ],
        )
        .map_err(EngineError::action_log)?;
        Ok(conn.last_insert_rowid())
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> EngineResult<Vec<ActionLogEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM action_logs ORDER BY id DESC LIMIT ?1"
            ))
            .map_err(EngineError::action_log)?;
        let rows = stmt
            .query_map([limit], map_row)
            .map_err(EngineError::action_log)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(EngineError::action_log)
    }

    /// All entries of one batch, oldest first.
    pub fn batch(&self, batch_id: &str) -> EngineResult<Vec<ActionLogEntry>> {
        let conn = self.lock()?;
        batch_entries(&conn, batch_id).map_err(EngineError::action_log)
    }

    /// Entries of the batch that undo should reverse next, if any.
    ///
    /// Only the most recent batch with at least one successful non-UNDO entry
    /// is a candidate. Once an UNDO batch references it, nothing is eligible
    /// until a new mutation is logged.
    pub fn undo_candidate(&self) -> EngineResult<Option<(String, Vec<ActionLogEntry>)>> {
        let conn = self.lock()?;

        let batch_id: Option<String> = conn
            .query_row(
                "SELECT batch_id FROM action_logs
                 WHERE action != 'UNDO' AND status = 'SUCCESS' AND batch_id IS NOT NULL
                 ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(EngineError::action_log)?;

        let Some(batch_id) = batch_id else {
            return Ok(None);
        };

        if batch_undone(&conn, &batch_id).map_err(EngineError::action_log)? {
            return Ok(None);
        }

        let entries = batch_entries(&conn, &batch_id).map_err(EngineError::action_log)?;
        Ok(Some((batch_id, entries)))
    }
}

/// Whether some UNDO entry references `batch_id`.
fn batch_undone(conn: &Connection, batch_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM action_logs WHERE action = 'UNDO' AND undo_of = ?1)",
        [batch_id],
        |row| row.get(0),
    )
}

fn batch_entries(conn: &Connection, batch_id: &str) -> rusqlite::Result<Vec<ActionLogEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM action_logs WHERE batch_id = ?1 ORDER BY id ASC"
    ))?;
    let rows = stmt.query_map([batch_id], map_row)?;
    rows.collect()
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<ActionLogEntry> {
    let action: String = row.get(2)?;
    let status: String = row.get(5)?;

    Ok(ActionLogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        action: ActionKind::from_str(&action)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        src_path: row.get(3)?,
        dst_path: row.get(4)?,
        status: ActionStatus::from_str(&status)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
        message: row.get(6)?,
        batch_id: row.get(7)?,
        undo_of: row.get(8)?,
    })
}
