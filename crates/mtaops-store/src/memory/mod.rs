//! In-memory stores for testing and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use mtaops_protocols::error::StoreError;
use mtaops_protocols::event::{EventType, HistoricOperationEvent};
use mtaops_protocols::operation::{Operation, OperationFilter, OperationState};
use mtaops_protocols::store::{HistoricEventStore, OperationStore};

mod artifacts;

pub use artifacts::{
    MemoryAnalyticsStore, MemoryFileStore, MemoryProcessLogStore, MemoryProgressMessageStore,
    MemoryTokenStore,
};

/// In-memory operation store.
///
/// A single write lock guards every mutation, which gives the same
/// compare-and-update atomicity the SQLite store gets from `UPDATE ... WHERE`.
pub struct MemoryOperationStore {
    operations: RwLock<HashMap<String, Operation>>,
}

impl MemoryOperationStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryOperationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperationStore for MemoryOperationStore {
    async fn insert(&self, operation: &Operation) -> Result<(), StoreError> {
        let mut operations = self.operations.write().await;
        if operations.contains_key(&operation.process_id) {
            return Err(StoreError::Duplicate(operation.process_id.clone()));
        }
        operations.insert(operation.process_id.clone(), operation.clone());
        Ok(())
    }

    async fn get(&self, process_id: &str) -> Result<Option<Operation>, StoreError> {
        let operations = self.operations.read().await;
        Ok(operations.get(process_id).cloned())
    }

    async fn update(&self, operation: &Operation) -> Result<(), StoreError> {
        let mut operations = self.operations.write().await;
        match operations.get_mut(&operation.process_id) {
            Some(existing) => {
                *existing = operation.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(operation.process_id.clone())),
        }
    }

    async fn query(&self, filter: &OperationFilter) -> Result<Vec<Operation>, StoreError> {
        let operations = self.operations.read().await;
        let matching = operations.values().filter(|op| filter.matches(op)).cloned().collect();
        Ok(filter.apply_order_and_paging(matching))
    }

    async fn count(&self, filter: &OperationFilter) -> Result<usize, StoreError> {
        let operations = self.operations.read().await;
        Ok(operations.values().filter(|op| filter.matches(op)).count())
    }

    async fn delete(&self, filter: &OperationFilter) -> Result<usize, StoreError> {
        let mut operations = self.operations.write().await;
        let before = operations.len();
        operations.retain(|_, op| !filter.matches(op));
        Ok(before - operations.len())
    }

    async fn compare_and_set_lock(
        &self,
        process_id: &str,
        expected: bool,
        new: bool,
    ) -> Result<bool, StoreError> {
        let mut operations = self.operations.write().await;
        match operations.get_mut(process_id) {
            Some(op) if op.has_acquired_lock == expected => {
                op.has_acquired_lock = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition_state(
        &self,
        process_id: &str,
        from: &[OperationState],
        to: OperationState,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut operations = self.operations.write().await;
        match operations.get_mut(process_id) {
            Some(op) if from.contains(&op.state) => {
                op.state = to;
                if ended_at.is_some() {
                    op.ended_at = ended_at;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_cleaned_up(&self, process_id: &str) -> Result<bool, StoreError> {
        let mut operations = self.operations.write().await;
        match operations.get_mut(process_id) {
            Some(op) if !op.cleaned_up => {
                op.cleaned_up = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-memory historic event log. Keeps append order.
pub struct MemoryHistoricEventStore {
    events: RwLock<Vec<HistoricOperationEvent>>,
}

impl MemoryHistoricEventStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryHistoricEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoricEventStore for MemoryHistoricEventStore {
    async fn append(&self, event: &HistoricOperationEvent) -> Result<(), StoreError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<HistoricOperationEvent>, StoreError> {
        let events = self.events.read().await;
        let mut matching: Vec<_> = events.iter().filter(|e| e.process_id == process_id).cloned().collect();
        // Stable sort keeps append order for equal timestamps.
        matching.sort_by_key(|e| e.timestamp);
        Ok(matching)
    }

    async fn find_older_than(
        &self,
        event_type: EventType,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<HistoricOperationEvent>, StoreError> {
        let events = self.events.read().await;
        let mut matching: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == event_type && e.timestamp < older_than)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.timestamp);
        Ok(matching)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|e| e.timestamp >= cutoff);
        Ok(before - events.len())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
