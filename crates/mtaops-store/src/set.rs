//! Bundle of every store the controller depends on.

use std::path::Path;
use std::sync::Arc;

use mtaops_protocols::error::StoreError;
use mtaops_protocols::store::{
    AnalyticsStore, FileStore, HistoricEventStore, OperationStore, ProcessLogStore,
    ProgressMessageStore, TokenStore,
};

use crate::memory::*;
use crate::sqlite::SqliteDatabase;

/// Shared handles to all stores, cheap to clone.
#[derive(Clone)]
pub struct StoreSet {
    pub operations: Arc<dyn OperationStore>,
    pub events: Arc<dyn HistoricEventStore>,
    pub progress_messages: Arc<dyn ProgressMessageStore>,
    pub process_logs: Arc<dyn ProcessLogStore>,
    pub files: Arc<dyn FileStore>,
    pub analytics: Arc<dyn AnalyticsStore>,
    pub tokens: Arc<dyn TokenStore>,
}

impl StoreSet {
    /// Stores backed by in-process maps.
    pub fn in_memory() -> Self {
        Self {
            operations: Arc::new(MemoryOperationStore::new()),
            events: Arc::new(MemoryHistoricEventStore::new()),
            progress_messages: Arc::new(MemoryProgressMessageStore::new()),
            process_logs: Arc::new(MemoryProcessLogStore::new()),
            files: Arc::new(MemoryFileStore::new()),
            analytics: Arc::new(MemoryAnalyticsStore::new()),
            tokens: Arc::new(MemoryTokenStore::new()),
        }
    }

    /// Stores sharing one SQLite database file.
    pub async fn sqlite(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = SqliteDatabase::open(path).await?;
        Ok(Self::from_database(&db))
    }

    /// Stores sharing one in-memory SQLite database.
    pub async fn sqlite_in_memory() -> Result<Self, StoreError> {
        let db = SqliteDatabase::in_memory().await?;
        Ok(Self::from_database(&db))
    }

    fn from_database(db: &SqliteDatabase) -> Self {
        Self {
            operations: Arc::new(db.operations()),
            events: Arc::new(db.events()),
            progress_messages: Arc::new(db.progress_messages()),
            process_logs: Arc::new(db.process_logs()),
            files: Arc::new(db.files()),
            analytics: Arc::new(db.analytics()),
            tokens: Arc::new(db.tokens()),
        }
    }
}
