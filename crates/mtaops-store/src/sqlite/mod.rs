//! SQLite backends.
//!
//! Every store shares one `tokio_rusqlite::Connection`, which serializes
//! calls on a dedicated thread. Timestamps are stored as fixed-width RFC 3339
//! text so that string comparison matches time order.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use tokio_rusqlite::Connection;
use tracing::debug;

use mtaops_protocols::error::StoreError;

use crate::schema::init_schema;

mod artifacts;
mod events;
mod operations;

pub use artifacts::{
    SqliteAnalyticsStore, SqliteFileStore, SqliteProcessLogStore, SqliteProgressMessageStore,
    SqliteTokenStore,
};
pub use events::SqliteHistoricEventStore;
pub use operations::SqliteOperationStore;

/// Handle to the controller's SQLite database.
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        Self::init(conn).await
    }

    /// Open (or create) a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        }
        debug!("Opening operation database at {:?}", path);
        let conn = Connection::open(path)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(query_error)?;
        Ok(Self { conn })
    }

    pub fn operations(&self) -> SqliteOperationStore {
        SqliteOperationStore::new(self.conn.clone())
    }

    pub fn events(&self) -> SqliteHistoricEventStore {
        SqliteHistoricEventStore::new(self.conn.clone())
    }

    pub fn progress_messages(&self) -> SqliteProgressMessageStore {
        SqliteProgressMessageStore::new(self.conn.clone())
    }

    pub fn process_logs(&self) -> SqliteProcessLogStore {
        SqliteProcessLogStore::new(self.conn.clone())
    }

    pub fn files(&self) -> SqliteFileStore {
        SqliteFileStore::new(self.conn.clone())
    }

    pub fn analytics(&self) -> SqliteAnalyticsStore {
        SqliteAnalyticsStore::new(self.conn.clone())
    }

    pub fn tokens(&self) -> SqliteTokenStore {
        SqliteTokenStore::new(self.conn.clone())
    }
}

pub(crate) fn query_error(e: tokio_rusqlite::Error) -> StoreError {
    StoreError::QueryError(e.to_string())
}

pub(crate) fn fmt_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_time(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse an enum column stored via its `as_str` form.
pub(crate) fn parse_enum<T>(idx: usize, text: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// `?, ?, ?` placeholder list for an `IN (...)` clause.
/// Most ids bound into one `IN (...)` list. SQLite caps bound variables
/// per statement.
pub(crate) const MAX_BOUND_IDS: usize = 500;

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod store_tests;
