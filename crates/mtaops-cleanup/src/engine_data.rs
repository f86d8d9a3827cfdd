//! Cleaners that reach into the workflow engine.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use mtaops_actions::ABORT_REASON;
use mtaops_protocols::engine::ProcessEngine;
use mtaops_protocols::error::CleanupError;
use mtaops_protocols::event::{EventType, HistoricOperationEvent};
use mtaops_protocols::store::HistoricEventStore;

use crate::cleaner::{Cleaner, PRIORITY_ENGINE};

/// Deletes the engine's history of finished processes started before the
/// cutoff, sub-processes first.
pub struct HistoricEngineDataCleaner {
    engine: Arc<dyn ProcessEngine>,
    page_size: usize,
}

impl HistoricEngineDataCleaner {
    pub fn new(engine: Arc<dyn ProcessEngine>, page_size: usize) -> Self {
        Self {
            engine,
            page_size: page_size.max(1),
        }
    }

    /// Delete the history of `root_id` and every sub-process under it.
    /// Returns how many ids were deleted; failures are logged.
    async fn delete_tree_history(&self, root_id: &str) -> Result<(usize, bool), CleanupError> {
        let mut ids = self.engine.historic_sub_executions(root_id).await?;
        ids.push(root_id.to_string());

        let mut deleted = 0;
        let mut root_deleted = false;
        for id in &ids {
            match self.engine.delete_historic_data(id).await {
                Ok(()) => {
                    deleted += 1;
                    root_deleted |= id == root_id;
                }
                Err(e) => warn!("Failed to delete engine history of {} (root {}): {}", id, root_id, e),
            }
        }
        Ok((deleted, root_deleted))
    }
}

#[async_trait]
impl Cleaner for HistoricEngineDataCleaner {
    fn name(&self) -> &str {
        "historic-engine-data"
    }

    fn priority(&self) -> u32 {
        PRIORITY_ENGINE
    }

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        // Roots whose history could not be deleted stay in the result set;
        // skipping past them keeps the sweep moving.
        let mut offset = 0;
        let mut deleted = 0;
        loop {
            let roots = self
                .engine
                .finished_processes_started_before(expiration, offset, self.page_size)
                .await?;
            for root in &roots {
                match self.delete_tree_history(root).await {
                    Ok((count, root_deleted)) => {
                        deleted += count;
                        if !root_deleted {
                            offset += 1;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to collect engine history of {}: {}", root, e);
                        offset += 1;
                    }
                }
            }
            if roots.len() < self.page_size {
                break;
            }
        }
        info!("Deleted engine history of {} process instances", deleted);
        Ok(deleted)
    }
}

/// Completes the teardown of aborted operations whose execution tree
/// outlived the abort.
///
/// Only ABORTED events older than the grace window are considered, so an
/// abort still in flight is left alone.
pub struct AbortedOperationsCleaner {
    engine: Arc<dyn ProcessEngine>,
    events: Arc<dyn HistoricEventStore>,
    grace: Duration,
}

impl AbortedOperationsCleaner {
    pub const DEFAULT_GRACE_MINUTES: i64 = 30;

    pub fn new(engine: Arc<dyn ProcessEngine>, events: Arc<dyn HistoricEventStore>) -> Self {
        Self {
            engine,
            events,
            grace: Duration::minutes(Self::DEFAULT_GRACE_MINUTES),
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    async fn reap(&self, process_id: &str) -> Result<bool, CleanupError> {
        if self.engine.is_finished(process_id).await? {
            return Ok(false);
        }
        self.engine.delete_execution_tree(process_id, ABORT_REASON).await?;

        let history = self.events.list_for_process(process_id).await?;
        if !history.iter().any(|e| e.event_type == EventType::AbortExecuted) {
            self.events
                .append(&HistoricOperationEvent::new(process_id, EventType::AbortExecuted))
                .await?;
        }
        Ok(true)
    }
}

#[async_trait]
impl Cleaner for AbortedOperationsCleaner {
    fn name(&self) -> &str {
        "aborted-operations"
    }

    fn priority(&self) -> u32 {
        PRIORITY_ENGINE
    }

    async fn execute(&self, _expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let threshold = Utc::now() - self.grace;
        let aborted = self.events.find_older_than(EventType::Aborted, threshold).await?;

        let mut seen = HashSet::new();
        let mut reaped = 0;
        for event in &aborted {
            if !seen.insert(event.process_id.as_str()) {
                continue;
            }
            match self.reap(&event.process_id).await {
                Ok(true) => {
                    info!("Tore down leftover execution tree of aborted {}", event.process_id);
                    reaped += 1;
                }
                Ok(false) => debug!("Aborted {} has no live execution tree", event.process_id),
                Err(e) => warn!("Failed to tear down aborted {}: {}", event.process_id, e),
            }
        }
        Ok(reaped)
    }
}

#[cfg(test)]
#[path = "engine_data_tests.rs"]
mod tests;
