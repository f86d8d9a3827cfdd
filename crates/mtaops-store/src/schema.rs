//! Database schema management.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
-- One row per operation
CREATE TABLE IF NOT EXISTS operations (
    process_id TEXT PRIMARY KEY,
    process_type TEXT NOT NULL,
    state TEXT NOT NULL,
    space_id TEXT NOT NULL,
    mta_id TEXT,
    namespace TEXT,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    user TEXT NOT NULL,
    has_acquired_lock INTEGER NOT NULL DEFAULT 0,
    cleaned_up INTEGER NOT NULL DEFAULT 0
);

-- Append-only audit trail
CREATE TABLE IF NOT EXISTS historic_operation_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    process_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS progress_messages (
    id TEXT PRIMARY KEY,
    process_id TEXT NOT NULL,
    step_id TEXT NOT NULL,
    message_type TEXT NOT NULL,
    text TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS process_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    process_id TEXT NOT NULL,
    space_id TEXT NOT NULL,
    name TEXT NOT NULL,
    content TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    space_id TEXT NOT NULL,
    namespace TEXT,
    name TEXT NOT NULL,
    size INTEGER NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS step_analytics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    process_id TEXT NOT NULL,
    step TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS access_tokens (
    user TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

-- Indexes for cleanup sweeps
CREATE INDEX IF NOT EXISTS idx_operations_state ON operations(state);
CREATE INDEX IF NOT EXISTS idx_operations_started ON operations(started_at);
CREATE INDEX IF NOT EXISTS idx_operations_mta ON operations(mta_id, space_id);
CREATE INDEX IF NOT EXISTS idx_events_process ON historic_operation_events(process_id);
CREATE INDEX IF NOT EXISTS idx_events_type_time ON historic_operation_events(event_type, timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_process ON progress_messages(process_id);
CREATE INDEX IF NOT EXISTS idx_messages_time ON progress_messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_logs_process ON process_logs(process_id);
CREATE INDEX IF NOT EXISTS idx_logs_modified ON process_logs(modified_at);
CREATE INDEX IF NOT EXISTS idx_files_modified ON files(modified_at);
CREATE INDEX IF NOT EXISTS idx_analytics_recorded ON step_analytics(recorded_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for table in ["operations", "historic_operation_events", "progress_messages", "access_tokens"] {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")
                .unwrap();
            assert!(stmt.exists([table]).unwrap(), "missing table {table}");
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }
}
