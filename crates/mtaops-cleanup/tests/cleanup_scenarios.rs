//! Cleanup scenarios over the in-memory stores and engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use mtaops_actions::{AbortAction, ActionContext, WorkerPool};
use mtaops_cleanup::{
    ActiveOperationsCleaner, Cleaner, CleanerOutcome, CleanupCoordinator, FilesCleaner,
    InactiveOperationsCleaner, OperationsCleaner, ProgressMessagesCleaner,
};
use mtaops_engine::{DeletionPolicy, InMemoryProcessEngine};
use mtaops_protocols::artifact::{MessageType, ProcessLogEntry, ProgressMessage};
use mtaops_protocols::engine::Variables;
use mtaops_protocols::error::{CleanupError, StoreError};
use mtaops_protocols::event::EventType;
use mtaops_protocols::operation::{Operation, OperationFilter, OperationState, ProcessType};
use mtaops_protocols::store::{OperationStore, ProgressMessageStore};
use mtaops_store::{MemoryOperationStore, MemoryProgressMessageStore, StoreSet};

fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

fn abort_action(stores: &StoreSet, engine: Arc<InMemoryProcessEngine>) -> Arc<AbortAction> {
    let ctx = ActionContext::new(stores, engine, Arc::new(WorkerPool::new(1)));
    Arc::new(AbortAction::new(Arc::new(ctx)))
}

#[tokio::test]
async fn test_expired_running_operation_is_aborted() {
    let stores = StoreSet::in_memory();
    let engine = Arc::new(InMemoryProcessEngine::new());
    engine.add_process("p1", "xs2-deploy", Variables::new());
    let op = Operation::new("p1", ProcessType::Deploy, "space-1", "alice").with_started_at(days_ago(10));
    stores.operations.insert(&op).await.unwrap();

    let cleaner = ActiveOperationsCleaner::new(stores.operations.clone(), abort_action(&stores, engine.clone()));
    let aborted = cleaner.execute(days_ago(7)).await.unwrap();

    assert_eq!(aborted, 1);
    assert_eq!(
        stores.operations.get("p1").await.unwrap().unwrap().state,
        OperationState::Aborted
    );
    let events: Vec<_> = stores
        .events
        .list_for_process("p1")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(events, vec![EventType::Aborted, EventType::AbortExecuted]);
}

#[tokio::test]
async fn test_active_cleaner_isolates_abort_failures() {
    let stores = StoreSet::in_memory();
    for id in ["p1", "p2"] {
        let op = Operation::new(id, ProcessType::Deploy, "space-1", "alice").with_started_at(days_ago(10));
        stores.operations.insert(&op).await.unwrap();
    }
    let recent = Operation::new("p3", ProcessType::Deploy, "space-1", "alice");
    stores.operations.insert(&recent).await.unwrap();
    // Every tree deletion conflicts until the retry deadline passes.
    let engine = Arc::new(InMemoryProcessEngine::new().with_deletion_policy(DeletionPolicy::new(
        std::time::Duration::from_millis(1),
        std::time::Duration::from_millis(5),
    )));
    engine.fail_next_deletions(u32::MAX);

    let cleaner = ActiveOperationsCleaner::new(stores.operations.clone(), abort_action(&stores, engine));
    let aborted = cleaner.execute(days_ago(7)).await.unwrap();

    assert_eq!(aborted, 0);
    assert_eq!(
        stores.operations.get("p3").await.unwrap().unwrap().state,
        OperationState::Running
    );
}

#[tokio::test]
async fn test_inactive_operation_is_cleaned_up_not_deleted() {
    let stores = StoreSet::in_memory();
    let finished = Operation::new("p2", ProcessType::Deploy, "space-1", "alice")
        .with_state(OperationState::Finished)
        .with_started_at(days_ago(31));
    let aborted = Operation::new("p3", ProcessType::Undeploy, "space-1", "alice")
        .with_state(OperationState::Aborted)
        .with_started_at(days_ago(31));
    let live = Operation::new("p4", ProcessType::Deploy, "space-1", "alice")
        .with_state(OperationState::Error)
        .with_started_at(days_ago(31));
    for op in [&finished, &aborted, &live] {
        stores.operations.insert(op).await.unwrap();
        stores
            .progress_messages
            .add(&ProgressMessage::new(&op.process_id, "deploy", MessageType::Info, "done"))
            .await
            .unwrap();
    }
    stores
        .process_logs
        .add(&ProcessLogEntry::new("p2", "space-1", "main.log", "..."))
        .await
        .unwrap();

    let cleaner = InactiveOperationsCleaner::new(
        stores.operations.clone(),
        stores.progress_messages.clone(),
        stores.process_logs.clone(),
    );
    assert_eq!(cleaner.execute(days_ago(30)).await.unwrap(), 2);

    for id in ["p2", "p3"] {
        let row = stores.operations.get(id).await.unwrap().unwrap();
        assert!(row.cleaned_up, "{} should be flagged", id);
        assert!(stores.progress_messages.list_for_process(id).await.unwrap().is_empty());
    }
    assert!(stores.process_logs.list_for_process("p2").await.unwrap().is_empty());

    // Non-final operations keep their artifacts.
    assert!(!stores.operations.get("p4").await.unwrap().unwrap().cleaned_up);
    assert_eq!(stores.progress_messages.list_for_process("p4").await.unwrap().len(), 1);

    // Already flagged: a second run finds nothing.
    assert_eq!(cleaner.execute(days_ago(30)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_inactive_cleaner_spans_batches_on_sqlite() {
    const ROWS: usize = InactiveOperationsCleaner::DEFAULT_BATCH_SIZE * 2 + 100;
    let stores = StoreSet::sqlite_in_memory().await.unwrap();
    for i in 0..ROWS {
        let id = format!("p{:06}", i);
        let op = Operation::new(&id, ProcessType::Deploy, "space-1", "alice")
            .with_state(OperationState::Finished)
            .with_started_at(days_ago(40));
        stores.operations.insert(&op).await.unwrap();
        if i % 250 == 0 {
            stores
                .progress_messages
                .add(&ProgressMessage::new(&id, "deploy", MessageType::Info, "done"))
                .await
                .unwrap();
        }
    }

    let cleaner = InactiveOperationsCleaner::new(
        stores.operations.clone(),
        stores.progress_messages.clone(),
        stores.process_logs.clone(),
    );
    assert_eq!(cleaner.execute(days_ago(30)).await.unwrap(), ROWS);

    let pending = OperationFilter::new().cleaned_up(false);
    assert_eq!(stores.operations.count(&pending).await.unwrap(), 0);
    assert!(stores.progress_messages.list_for_process("p000000").await.unwrap().is_empty());
    assert_eq!(cleaner.execute(days_ago(30)).await.unwrap(), 0);
}

/// Progress message store whose bulk delete fails once on the given call.
struct FailingOnCall {
    inner: MemoryProgressMessageStore,
    calls: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl ProgressMessageStore for FailingOnCall {
    async fn add(&self, message: &ProgressMessage) -> Result<(), StoreError> {
        self.inner.add(message).await
    }

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<ProgressMessage>, StoreError> {
        self.inner.list_for_process(process_id).await
    }

    async fn count_by_type(&self, process_id: &str, message_type: MessageType) -> Result<usize, StoreError> {
        self.inner.count_by_type(process_id, message_type).await
    }

    async fn delete_by_type(&self, process_id: &str, message_type: MessageType) -> Result<usize, StoreError> {
        self.inner.delete_by_type(process_id, message_type).await
    }

    async fn delete_by_process_ids(&self, process_ids: &[String]) -> Result<usize, StoreError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            return Err(StoreError::QueryError("database is locked".to_string()));
        }
        self.inner.delete_by_process_ids(process_ids).await
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.delete_older_than(cutoff).await
    }
}

#[tokio::test]
async fn test_inactive_cleaner_keeps_progress_of_earlier_batches() {
    let stores = StoreSet::in_memory();
    for i in 0..5 {
        let op = Operation::new(format!("p{}", i), ProcessType::Deploy, "space-1", "alice")
            .with_state(OperationState::Finished)
            .with_started_at(days_ago(40));
        stores.operations.insert(&op).await.unwrap();
    }
    let messages = Arc::new(FailingOnCall {
        inner: MemoryProgressMessageStore::new(),
        calls: AtomicUsize::new(0),
        fail_on: 1,
    });
    let cleaner = InactiveOperationsCleaner::new(stores.operations.clone(), messages, stores.process_logs.clone())
        .with_batch_size(2);

    // The second batch fails; the first stays flagged.
    assert!(cleaner.execute(days_ago(30)).await.is_err());
    let pending = OperationFilter::new().cleaned_up(false);
    assert_eq!(stores.operations.count(&pending).await.unwrap(), 3);

    // The next run picks up the rest.
    assert_eq!(cleaner.execute(days_ago(30)).await.unwrap(), 3);
    assert_eq!(stores.operations.count(&pending).await.unwrap(), 0);
}

struct BrokenCleaner;

#[async_trait]
impl Cleaner for BrokenCleaner {
    fn name(&self) -> &str {
        "files"
    }

    fn priority(&self) -> u32 {
        20
    }

    async fn execute(&self, _expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        Err(CleanupError::Custom("file storage unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_files_failure_does_not_stop_progress_messages() {
    let stores = StoreSet::in_memory();
    for i in 0..3 {
        let message = ProgressMessage::new("p1", "deploy", MessageType::Info, format!("step {}", i)).at(days_ago(9));
        stores.progress_messages.add(&message).await.unwrap();
    }

    let coordinator = CleanupCoordinator::new(vec![
        Arc::new(BrokenCleaner),
        Arc::new(ProgressMessagesCleaner::new(stores.progress_messages.clone())),
    ]);
    let report = coordinator.execute(days_ago(7)).await;

    assert!(matches!(report.get("files"), Some(CleanerOutcome::Failed(_))));
    assert_eq!(report.get("progress-messages"), Some(&CleanerOutcome::Cleaned(3)));
}

#[tokio::test]
async fn test_real_files_cleaner_reports_count() {
    let stores = StoreSet::in_memory();
    let coordinator = CleanupCoordinator::new(vec![Arc::new(FilesCleaner::new(stores.files.clone()))]);
    let report = coordinator.execute(days_ago(7)).await;
    assert_eq!(report.get("files"), Some(&CleanerOutcome::Cleaned(0)));
}

/// Operation store counting page fetches and bulk deletes.
struct CountingOperationStore {
    inner: MemoryOperationStore,
    queries: AtomicUsize,
    deletes: AtomicUsize,
    page_sizes: std::sync::Mutex<Vec<usize>>,
}

#[async_trait]
impl OperationStore for CountingOperationStore {
    async fn insert(&self, operation: &Operation) -> Result<(), StoreError> {
        self.inner.insert(operation).await
    }

    async fn get(&self, process_id: &str) -> Result<Option<Operation>, StoreError> {
        self.inner.get(process_id).await
    }

    async fn update(&self, operation: &Operation) -> Result<(), StoreError> {
        self.inner.update(operation).await
    }

    async fn query(&self, filter: &OperationFilter) -> Result<Vec<Operation>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let page = self.inner.query(filter).await?;
        self.page_sizes.lock().unwrap().push(page.len());
        Ok(page)
    }

    async fn count(&self, filter: &OperationFilter) -> Result<usize, StoreError> {
        self.inner.count(filter).await
    }

    async fn delete(&self, filter: &OperationFilter) -> Result<usize, StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(filter).await
    }

    async fn compare_and_set_lock(
        &self,
        process_id: &str,
        expected: bool,
        new: bool,
    ) -> Result<bool, StoreError> {
        self.inner.compare_and_set_lock(process_id, expected, new).await
    }

    async fn transition_state(
        &self,
        process_id: &str,
        from: &[OperationState],
        to: OperationState,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        self.inner.transition_state(process_id, from, to, ended_at).await
    }

    async fn mark_cleaned_up(&self, process_id: &str) -> Result<bool, StoreError> {
        self.inner.mark_cleaned_up(process_id).await
    }
}

#[tokio::test]
async fn test_paginated_sweep_terminates_on_short_page() {
    const PAGE: usize = 4;
    let counting = Arc::new(CountingOperationStore {
        inner: MemoryOperationStore::new(),
        queries: AtomicUsize::new(0),
        deletes: AtomicUsize::new(0),
        page_sizes: std::sync::Mutex::new(Vec::new()),
    });
    let mut stores = StoreSet::in_memory();
    stores.operations = counting.clone();
    let engine = Arc::new(InMemoryProcessEngine::new());

    for i in 0..3 * PAGE {
        let id = format!("p{:02}", i);
        engine.add_process(&id, "xs2-deploy", Variables::new());
        let op = Operation::new(&id, ProcessType::Deploy, "space-1", "alice").with_started_at(days_ago(10));
        counting.inner.insert(&op).await.unwrap();
    }

    let cleaner = OperationsCleaner::new(stores.operations.clone(), abort_action(&stores, engine)).with_page_size(PAGE);
    let deleted = cleaner.execute(days_ago(7)).await.unwrap();

    assert_eq!(counting.queries.load(Ordering::SeqCst), 3);
    let sizes = counting.page_sizes.lock().unwrap().clone();
    assert!(sizes[2] < PAGE);
    assert_eq!(counting.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(deleted, 3 * PAGE);
    assert_eq!(counting.inner.count(&OperationFilter::new()).await.unwrap(), 0);
}
