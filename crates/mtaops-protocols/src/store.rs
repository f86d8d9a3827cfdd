//! Persistence protocol definitions.
//!
//! The operation row is the single source of truth for both state and lock
//! ownership. Stores hold no state cache across calls; every mutation goes
//! through the backing store's own atomic update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::artifact::{AccessToken, MessageType, ProcessLogEntry, ProgressMessage, StepAnalytics, StoredFile};
use crate::error::StoreError;
use crate::event::{EventType, HistoricOperationEvent};
use crate::operation::{Operation, OperationFilter, OperationState};

/// Persisted operation records.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Insert a new operation. Fails with [`StoreError::Duplicate`] if the
    /// process id already exists.
    async fn insert(&self, operation: &Operation) -> Result<(), StoreError>;

    /// Load an operation by process id.
    async fn get(&self, process_id: &str) -> Result<Option<Operation>, StoreError>;

    /// Overwrite an existing operation.
    async fn update(&self, operation: &Operation) -> Result<(), StoreError>;

    /// Query operations matching a filter, honoring its order and paging.
    async fn query(&self, filter: &OperationFilter) -> Result<Vec<Operation>, StoreError>;

    /// Count operations matching a filter (paging is ignored).
    async fn count(&self, filter: &OperationFilter) -> Result<usize, StoreError>;

    /// Delete operations matching a filter (paging is ignored).
    async fn delete(&self, filter: &OperationFilter) -> Result<usize, StoreError>;

    /// Atomically set `has_acquired_lock` to `new` iff it currently equals
    /// `expected`. Returns whether the row was changed.
    async fn compare_and_set_lock(
        &self,
        process_id: &str,
        expected: bool,
        new: bool,
    ) -> Result<bool, StoreError>;

    /// Atomically move the operation to `to` iff its current state is one of
    /// `from`. Sets `ended_at` when given. Returns whether the row was changed.
    async fn transition_state(
        &self,
        process_id: &str,
        from: &[OperationState],
        to: OperationState,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    /// Set `cleaned_up` to true iff it is currently false.
    async fn mark_cleaned_up(&self, process_id: &str) -> Result<bool, StoreError>;
}

/// Append-only audit trail.
#[async_trait]
pub trait HistoricEventStore: Send + Sync {
    async fn append(&self, event: &HistoricOperationEvent) -> Result<(), StoreError>;

    /// Events of one process, oldest first. Equal timestamps keep append order.
    async fn list_for_process(&self, process_id: &str) -> Result<Vec<HistoricOperationEvent>, StoreError>;

    /// Events of a type recorded strictly before `older_than`, oldest first.
    async fn find_older_than(
        &self,
        event_type: EventType,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<HistoricOperationEvent>, StoreError>;

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Progress messages emitted by workflow steps.
#[async_trait]
pub trait ProgressMessageStore: Send + Sync {
    async fn add(&self, message: &ProgressMessage) -> Result<(), StoreError>;

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<ProgressMessage>, StoreError>;

    async fn count_by_type(&self, process_id: &str, message_type: MessageType) -> Result<usize, StoreError>;

    async fn delete_by_type(&self, process_id: &str, message_type: MessageType) -> Result<usize, StoreError>;

    async fn delete_by_process_ids(&self, process_ids: &[String]) -> Result<usize, StoreError>;

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Process log files.
#[async_trait]
pub trait ProcessLogStore: Send + Sync {
    async fn add(&self, entry: &ProcessLogEntry) -> Result<(), StoreError>;

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<ProcessLogEntry>, StoreError>;

    async fn delete_by_process_ids(&self, process_ids: &[String]) -> Result<usize, StoreError>;

    async fn delete_modified_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Uploaded file metadata and blobs.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn add(&self, file: &StoredFile) -> Result<(), StoreError>;

    async fn list(&self, space_id: &str) -> Result<Vec<StoredFile>, StoreError>;

    async fn delete_modified_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Per-step timing analytics.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn record(&self, sample: &StepAnalytics) -> Result<(), StoreError>;

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<StepAnalytics>, StoreError>;

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Cached access tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn put(&self, token: &AccessToken) -> Result<(), StoreError>;

    async fn get(&self, user: &str) -> Result<Option<AccessToken>, StoreError>;

    /// Drop every token whose expiry is at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}
