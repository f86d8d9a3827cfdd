//! Cleaners over the operation rows themselves.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use mtaops_actions::ProcessAction;
use mtaops_protocols::error::CleanupError;
use mtaops_protocols::operation::{Operation, OperationFilter, OperationOrder};
use mtaops_protocols::store::{OperationStore, ProcessLogStore, ProgressMessageStore};

use crate::cleaner::{Cleaner, PRIORITY_ARTIFACTS, PRIORITY_OPERATIONS, PRIORITY_RECLAIM};

/// Abort each operation, logging failures. Returns how many were aborted.
async fn abort_each(abort: &dyn ProcessAction, operations: &[Operation]) -> usize {
    let mut aborted = 0;
    for operation in operations {
        match abort.execute(&operation.user, &operation.process_id).await {
            Ok(()) => aborted += 1,
            Err(e) => warn!("Failed to abort expired operation {}: {}", operation.process_id, e),
        }
    }
    aborted
}

/// Aborts operations still live past the retention cutoff, newest first.
pub struct ActiveOperationsCleaner {
    operations: Arc<dyn OperationStore>,
    abort: Arc<dyn ProcessAction>,
}

impl ActiveOperationsCleaner {
    pub fn new(operations: Arc<dyn OperationStore>, abort: Arc<dyn ProcessAction>) -> Self {
        Self { operations, abort }
    }
}

#[async_trait]
impl Cleaner for ActiveOperationsCleaner {
    fn name(&self) -> &str {
        "active-operations"
    }

    fn priority(&self) -> u32 {
        PRIORITY_OPERATIONS
    }

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let filter = OperationFilter::new()
            .in_non_final_state()
            .started_before(expiration)
            .order(OperationOrder::StartedAtDesc);
        let expired = self.operations.query(&filter).await?;
        debug!("Aborting {} operations started before {}", expired.len(), expiration);

        let aborted = abort_each(self.abort.as_ref(), &expired).await;
        info!("Aborted {} of {} expired active operations", aborted, expired.len());
        Ok(aborted)
    }
}

/// Legacy sweep: aborts live operations page by page, then bulk-deletes
/// every operation row started before the cutoff.
///
/// Pages are read at a growing offset over the shrinking set of live
/// operations, so a row can slide past the window; the closing bulk delete
/// still removes it.
pub struct OperationsCleaner {
    operations: Arc<dyn OperationStore>,
    abort: Arc<dyn ProcessAction>,
    page_size: usize,
}

impl OperationsCleaner {
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    pub fn new(operations: Arc<dyn OperationStore>, abort: Arc<dyn ProcessAction>) -> Self {
        Self {
            operations,
            abort,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl Cleaner for OperationsCleaner {
    fn name(&self) -> &str {
        "operations"
    }

    fn priority(&self) -> u32 {
        PRIORITY_OPERATIONS
    }

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let mut offset = 0;
        let mut aborted = 0;
        loop {
            let filter = OperationFilter::new()
                .in_non_final_state()
                .started_before(expiration)
                .order(OperationOrder::ProcessIdAsc)
                .offset(offset)
                .limit(self.page_size);
            let page = self.operations.query(&filter).await?;
            aborted += abort_each(self.abort.as_ref(), &page).await;
            offset += page.len();
            if page.len() < self.page_size {
                break;
            }
        }

        let deleted = self
            .operations
            .delete(&OperationFilter::new().started_before(expiration))
            .await?;
        info!("Aborted {} operations, deleted {} operations", aborted, deleted);
        Ok(deleted)
    }
}

/// Deletes operation rows started before the cutoff. Runs last so that the
/// cleaners before it still see the rows.
pub struct ExpiredOperationsCleaner {
    operations: Arc<dyn OperationStore>,
}

impl ExpiredOperationsCleaner {
    pub fn new(operations: Arc<dyn OperationStore>) -> Self {
        Self { operations }
    }
}

#[async_trait]
impl Cleaner for ExpiredOperationsCleaner {
    fn name(&self) -> &str {
        "expired-operations"
    }

    fn priority(&self) -> u32 {
        PRIORITY_RECLAIM
    }

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let deleted = self
            .operations
            .delete(&OperationFilter::new().started_before(expiration))
            .await?;
        info!("Deleted {} operations started before {}", deleted, expiration);
        Ok(deleted)
    }
}

/// Reclaims progress messages and process logs of finished or aborted
/// operations and flags them as cleaned up. The operation rows stay.
///
/// Works in batches: each batch is flagged right after its deletions, so a
/// failing batch leaves the earlier ones done and the next run resumes with
/// what is left. A run interrupted between deletion and flagging repeats a
/// deletion that finds nothing.
pub struct InactiveOperationsCleaner {
    operations: Arc<dyn OperationStore>,
    progress_messages: Arc<dyn ProgressMessageStore>,
    process_logs: Arc<dyn ProcessLogStore>,
    batch_size: usize,
}

impl InactiveOperationsCleaner {
    pub const DEFAULT_BATCH_SIZE: usize = 500;

    pub fn new(
        operations: Arc<dyn OperationStore>,
        progress_messages: Arc<dyn ProgressMessageStore>,
        process_logs: Arc<dyn ProcessLogStore>,
    ) -> Self {
        Self {
            operations,
            progress_messages,
            process_logs,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn clean_batch(&self, ids: &[String]) -> Result<usize, CleanupError> {
        let messages = self.progress_messages.delete_by_process_ids(ids).await?;
        let logs = self.process_logs.delete_by_process_ids(ids).await?;
        debug!("Deleted {} progress messages and {} process logs", messages, logs);

        let mut flagged = 0;
        for id in ids {
            match self.operations.mark_cleaned_up(id).await {
                Ok(true) => flagged += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to flag operation {} as cleaned up: {}", id, e),
            }
        }
        Ok(flagged)
    }
}

#[async_trait]
impl Cleaner for InactiveOperationsCleaner {
    fn name(&self) -> &str {
        "inactive-operations"
    }

    fn priority(&self) -> u32 {
        PRIORITY_ARTIFACTS
    }

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let filter = OperationFilter::new()
            .in_final_state()
            .cleaned_up(false)
            .started_before(expiration)
            .order(OperationOrder::StartedAtDesc);
        let inactive = self.operations.query(&filter).await?;
        if inactive.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = inactive.into_iter().map(|op| op.process_id).collect();
        let mut flagged = 0;
        for batch in ids.chunks(self.batch_size) {
            flagged += self.clean_batch(batch).await?;
        }
        info!("Cleaned up {} inactive operations", flagged);
        Ok(flagged)
    }
}
