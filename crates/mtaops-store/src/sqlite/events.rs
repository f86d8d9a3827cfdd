//! SQLite historic event log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tokio_rusqlite::Connection;

use mtaops_protocols::error::StoreError;
use mtaops_protocols::event::{EventType, HistoricOperationEvent};
use mtaops_protocols::store::HistoricEventStore;

use super::{fmt_time, parse_enum, parse_time, query_error};

/// Append-only event rows. The autoincrement id breaks timestamp ties.
pub struct SqliteHistoricEventStore {
    conn: Connection,
}

impl SqliteHistoricEventStore {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<HistoricOperationEvent> {
    let event_type: String = row.get(1)?;
    let timestamp: String = row.get(2)?;
    Ok(HistoricOperationEvent {
        process_id: row.get(0)?,
        event_type: parse_enum(1, &event_type)?,
        timestamp: parse_time(2, &timestamp)?,
    })
}

#[async_trait]
impl HistoricEventStore for SqliteHistoricEventStore {
    async fn append(&self, event: &HistoricOperationEvent) -> Result<(), StoreError> {
        let event = event.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO historic_operation_events (process_id, event_type, timestamp)
                     VALUES (?1, ?2, ?3)",
                    params![event.process_id, event.event_type.as_str(), fmt_time(&event.timestamp)],
                )?;
                Ok(())
            })
            .await
            .map_err(query_error)
    }

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<HistoricOperationEvent>, StoreError> {
        let process_id = process_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT process_id, event_type, timestamp FROM historic_operation_events
                     WHERE process_id = ?1 ORDER BY timestamp ASC, id ASC",
                )?;
                let events = stmt
                    .query_map([&process_id], row_to_event)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(events)
            })
            .await
            .map_err(query_error)
    }

    async fn find_older_than(
        &self,
        event_type: EventType,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<HistoricOperationEvent>, StoreError> {
        let cutoff = fmt_time(&older_than);
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT process_id, event_type, timestamp FROM historic_operation_events
                     WHERE event_type = ?1 AND timestamp < ?2 ORDER BY timestamp ASC, id ASC",
                )?;
                let events = stmt
                    .query_map(params![event_type.as_str(), cutoff], row_to_event)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(events)
            })
            .await
            .map_err(query_error)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = fmt_time(&cutoff);
        self.conn
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM historic_operation_events WHERE timestamp < ?1",
                    [&cutoff],
                )?)
            })
            .await
            .map_err(query_error)
    }
}
