//! SQLite artifact stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Row};
use tokio_rusqlite::Connection;

use mtaops_protocols::artifact::{AccessToken, MessageType, ProcessLogEntry, ProgressMessage, StepAnalytics, StoredFile};
use mtaops_protocols::error::StoreError;
use mtaops_protocols::store::{AnalyticsStore, FileStore, ProcessLogStore, ProgressMessageStore, TokenStore};

use super::{fmt_time, parse_enum, parse_time, placeholders, query_error, MAX_BOUND_IDS};

/// Delete rows of `table` whose `process_id` is in `process_ids`, in
/// chunks of [`MAX_BOUND_IDS`] within one transaction.
async fn delete_for_processes(
    conn: &Connection,
    table: &'static str,
    process_ids: &[String],
) -> Result<usize, StoreError> {
    if process_ids.is_empty() {
        return Ok(0);
    }
    let ids = process_ids.to_vec();
    conn.call(move |conn| {
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for chunk in ids.chunks(MAX_BOUND_IDS) {
            let sql = format!(
                "DELETE FROM {} WHERE process_id IN ({})",
                table,
                placeholders(chunk.len())
            );
            deleted += tx.execute(&sql, params_from_iter(chunk.iter()))?;
        }
        tx.commit()?;
        Ok(deleted)
    })
    .await
    .map_err(query_error)
}

/// Delete rows of `table` whose `column` timestamp is before `cutoff`.
async fn delete_before(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
    cutoff: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let sql = format!("DELETE FROM {} WHERE {} < ?1", table, column);
    let cutoff = fmt_time(&cutoff);
    conn.call(move |conn| Ok(conn.execute(&sql, [&cutoff])?))
        .await
        .map_err(query_error)
}

pub struct SqliteProgressMessageStore {
    conn: Connection,
}

impl SqliteProgressMessageStore {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<ProgressMessage> {
    let message_type: String = row.get(3)?;
    let timestamp: String = row.get(5)?;
    Ok(ProgressMessage {
        id: row.get(0)?,
        process_id: row.get(1)?,
        step_id: row.get(2)?,
        message_type: parse_enum(3, &message_type)?,
        text: row.get(4)?,
        timestamp: parse_time(5, &timestamp)?,
    })
}

#[async_trait]
impl ProgressMessageStore for SqliteProgressMessageStore {
    async fn add(&self, message: &ProgressMessage) -> Result<(), StoreError> {
        let m = message.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO progress_messages (id, process_id, step_id, message_type, text, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![m.id, m.process_id, m.step_id, m.message_type.as_str(), m.text, fmt_time(&m.timestamp)],
                )?;
                Ok(())
            })
            .await
            .map_err(query_error)
    }

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<ProgressMessage>, StoreError> {
        let process_id = process_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, process_id, step_id, message_type, text, timestamp
                     FROM progress_messages WHERE process_id = ?1 ORDER BY timestamp ASC",
                )?;
                let messages = stmt
                    .query_map([&process_id], row_to_message)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(messages)
            })
            .await
            .map_err(query_error)
    }

    async fn count_by_type(&self, process_id: &str, message_type: MessageType) -> Result<usize, StoreError> {
        let process_id = process_id.to_string();
        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM progress_messages WHERE process_id = ?1 AND message_type = ?2",
                    params![process_id, message_type.as_str()],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await
            .map_err(query_error)
    }

    async fn delete_by_type(&self, process_id: &str, message_type: MessageType) -> Result<usize, StoreError> {
        let process_id = process_id.to_string();
        self.conn
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM progress_messages WHERE process_id = ?1 AND message_type = ?2",
                    params![process_id, message_type.as_str()],
                )?)
            })
            .await
            .map_err(query_error)
    }

    async fn delete_by_process_ids(&self, process_ids: &[String]) -> Result<usize, StoreError> {
        delete_for_processes(&self.conn, "progress_messages", process_ids).await
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        delete_before(&self.conn, "progress_messages", "timestamp", cutoff).await
    }
}

pub struct SqliteProcessLogStore {
    conn: Connection,
}

impl SqliteProcessLogStore {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ProcessLogStore for SqliteProcessLogStore {
    async fn add(&self, entry: &ProcessLogEntry) -> Result<(), StoreError> {
        let e = entry.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO process_logs (process_id, space_id, name, content, modified_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![e.process_id, e.space_id, e.name, e.content, fmt_time(&e.modified_at)],
                )?;
                Ok(())
            })
            .await
            .map_err(query_error)
    }

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<ProcessLogEntry>, StoreError> {
        let process_id = process_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT process_id, space_id, name, content, modified_at
                     FROM process_logs WHERE process_id = ?1 ORDER BY id ASC",
                )?;
                let logs = stmt
                    .query_map([&process_id], |row| {
                        let modified_at: String = row.get(4)?;
                        Ok(ProcessLogEntry {
                            process_id: row.get(0)?,
                            space_id: row.get(1)?,
                            name: row.get(2)?,
                            content: row.get(3)?,
                            modified_at: parse_time(4, &modified_at)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(logs)
            })
            .await
            .map_err(query_error)
    }

    async fn delete_by_process_ids(&self, process_ids: &[String]) -> Result<usize, StoreError> {
        delete_for_processes(&self.conn, "process_logs", process_ids).await
    }

    async fn delete_modified_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        delete_before(&self.conn, "process_logs", "modified_at", cutoff).await
    }
}

pub struct SqliteFileStore {
    conn: Connection,
}

impl SqliteFileStore {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl FileStore for SqliteFileStore {
    async fn add(&self, file: &StoredFile) -> Result<(), StoreError> {
        let f = file.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO files (id, space_id, namespace, name, size, modified_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![f.id, f.space_id, f.namespace, f.name, f.size as i64, fmt_time(&f.modified_at)],
                )?;
                Ok(())
            })
            .await
            .map_err(query_error)
    }

    async fn list(&self, space_id: &str) -> Result<Vec<StoredFile>, StoreError> {
        let space_id = space_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, space_id, namespace, name, size, modified_at
                     FROM files WHERE space_id = ?1 ORDER BY modified_at ASC",
                )?;
                let files = stmt
                    .query_map([&space_id], |row| {
                        let size: i64 = row.get(4)?;
                        let modified_at: String = row.get(5)?;
                        Ok(StoredFile {
                            id: row.get(0)?,
                            space_id: row.get(1)?,
                            namespace: row.get(2)?,
                            name: row.get(3)?,
                            size: size.max(0) as u64,
                            modified_at: parse_time(5, &modified_at)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(files)
            })
            .await
            .map_err(query_error)
    }

    async fn delete_modified_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        delete_before(&self.conn, "files", "modified_at", cutoff).await
    }
}

pub struct SqliteAnalyticsStore {
    conn: Connection,
}

impl SqliteAnalyticsStore {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl AnalyticsStore for SqliteAnalyticsStore {
    async fn record(&self, sample: &StepAnalytics) -> Result<(), StoreError> {
        let s = sample.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO step_analytics (process_id, step, duration_ms, recorded_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![s.process_id, s.step, s.duration_ms as i64, fmt_time(&s.recorded_at)],
                )?;
                Ok(())
            })
            .await
            .map_err(query_error)
    }

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<StepAnalytics>, StoreError> {
        let process_id = process_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT process_id, step, duration_ms, recorded_at
                     FROM step_analytics WHERE process_id = ?1 ORDER BY id ASC",
                )?;
                let samples = stmt
                    .query_map([&process_id], |row| {
                        let duration_ms: i64 = row.get(2)?;
                        let recorded_at: String = row.get(3)?;
                        Ok(StepAnalytics {
                            process_id: row.get(0)?,
                            step: row.get(1)?,
                            duration_ms: duration_ms.max(0) as u64,
                            recorded_at: parse_time(3, &recorded_at)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(samples)
            })
            .await
            .map_err(query_error)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        delete_before(&self.conn, "step_analytics", "recorded_at", cutoff).await
    }
}

pub struct SqliteTokenStore {
    conn: Connection,
}

impl SqliteTokenStore {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn put(&self, token: &AccessToken) -> Result<(), StoreError> {
        let t = token.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO access_tokens (user, value, expires_at) VALUES (?1, ?2, ?3)",
                    params![t.user, t.value, fmt_time(&t.expires_at)],
                )?;
                Ok(())
            })
            .await
            .map_err(query_error)
    }

    async fn get(&self, user: &str) -> Result<Option<AccessToken>, StoreError> {
        let user = user.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT user, value, expires_at FROM access_tokens WHERE user = ?1")?;
                let mut rows = stmt.query_map([&user], |row| {
                    let expires_at: String = row.get(2)?;
                    Ok(AccessToken {
                        user: row.get(0)?,
                        value: row.get(1)?,
                        expires_at: parse_time(2, &expires_at)?,
                    })
                })?;
                let token = rows.next().transpose()?;
                Ok(token)
            })
            .await
            .map_err(query_error)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let now = fmt_time(&now);
        self.conn
            .call(move |conn| Ok(conn.execute("DELETE FROM access_tokens WHERE expires_at <= ?1", [&now])?))
            .await
            .map_err(query_error)
    }
}
