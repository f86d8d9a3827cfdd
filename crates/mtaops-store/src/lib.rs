//! # mtaops Store
//!
//! Persistence for operations, the historic event log and the per-operation
//! artifacts reclaimed by cleanup.
//!
//! ## Backends
//!
//! - SQLite via `tokio-rusqlite` ([`SqliteDatabase`])
//! - In-memory maps for tests and dry runs ([`memory`])

pub mod memory;
pub mod schema;
pub mod sqlite;

mod set;

pub use memory::{
    MemoryAnalyticsStore, MemoryFileStore, MemoryHistoricEventStore, MemoryOperationStore,
    MemoryProcessLogStore, MemoryProgressMessageStore, MemoryTokenStore,
};
pub use set::StoreSet;
pub use sqlite::SqliteDatabase;
