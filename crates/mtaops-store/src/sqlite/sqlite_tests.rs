use super::*;
use chrono::Duration;
use mtaops_protocols::artifact::{AccessToken, MessageType, ProcessLogEntry, ProgressMessage, StoredFile};
use mtaops_protocols::event::{EventType, HistoricOperationEvent};
use mtaops_protocols::operation::{Operation, OperationFilter, OperationOrder, OperationState, ProcessType};
use mtaops_protocols::store::{
    FileStore, HistoricEventStore, OperationStore, ProcessLogStore, ProgressMessageStore, TokenStore,
};
use std::sync::Arc;
use tempfile::tempdir;

fn operation(id: &str) -> Operation {
    Operation::new(id, ProcessType::Deploy, "space-1", "alice")
}

#[tokio::test]
async fn test_open_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("ops.db");

    let db = SqliteDatabase::open(&path).await.unwrap();
    db.operations().insert(&operation("p1")).await.unwrap();
    assert!(path.exists());

    // Reopening sees the persisted row.
    let reopened = SqliteDatabase::open(&path).await.unwrap();
    assert!(reopened.operations().get("p1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_operation_round_trip_preserves_fields() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let store = db.operations();
    let started = Utc::now() - Duration::hours(1);
    let op = operation("p1")
        .with_mta_id("shop")
        .with_namespace("blue")
        .with_started_at(started);
    store.insert(&op).await.unwrap();

    let loaded = store.get("p1").await.unwrap().unwrap();
    assert_eq!(loaded, op);
}

#[tokio::test]
async fn test_insert_duplicate_fails() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let store = db.operations();
    store.insert(&operation("p1")).await.unwrap();

    let result = store.insert(&operation("p1")).await;
    assert!(matches!(result, Err(StoreError::Duplicate(id)) if id == "p1"));
}

#[tokio::test]
async fn test_update_missing_fails() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let result = db.operations().update(&operation("ghost")).await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_lock_compare_and_set_single_winner() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let store = Arc::new(db.operations());
    store.insert(&operation("p1")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.compare_and_set_lock("p1", false, true).await.unwrap()
        }));
    }
    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert!(store.get("p1").await.unwrap().unwrap().has_acquired_lock);
}

#[tokio::test]
async fn test_transition_state_only_from_listed_states() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let store = db.operations();
    store.insert(&operation("p1")).await.unwrap();
    let now = Utc::now();

    assert!(!store
        .transition_state("p1", &[OperationState::Error], OperationState::Running, None)
        .await
        .unwrap());

    let non_final = OperationState::non_final_states();
    assert!(store.transition_state("p1", &non_final, OperationState::Aborted, Some(now)).await.unwrap());
    assert!(!store.transition_state("p1", &non_final, OperationState::Aborted, Some(now)).await.unwrap());

    let op = store.get("p1").await.unwrap().unwrap();
    assert_eq!(op.state, OperationState::Aborted);
    assert_eq!(op.ended_at, Some(now));
}

#[tokio::test]
async fn test_query_filters_order_and_paging() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let store = db.operations();
    let now = Utc::now();
    for (i, id) in ["c", "a", "b"].iter().enumerate() {
        store
            .insert(&operation(id).with_started_at(now - Duration::days(10 + i as i64)))
            .await
            .unwrap();
    }
    store
        .insert(&operation("fresh").with_state(OperationState::Finished))
        .await
        .unwrap();

    let old = OperationFilter::new().started_before(now - Duration::days(5));
    let ids: Vec<_> = store.query(&old).await.unwrap().into_iter().map(|o| o.process_id).collect();
    assert_eq!(ids, ["a", "b", "c"]);

    let page = store
        .query(&old.clone().order(OperationOrder::StartedAtAsc).limit(2))
        .await
        .unwrap();
    let ids: Vec<_> = page.into_iter().map(|o| o.process_id).collect();
    assert_eq!(ids, ["b", "a"]);

    let finished = OperationFilter::new().in_final_state();
    assert_eq!(store.count(&finished).await.unwrap(), 1);
    assert_eq!(store.count(&old.clone().offset(1)).await.unwrap(), 3);

    assert_eq!(store.delete(&old).await.unwrap(), 3);
    assert_eq!(store.count(&OperationFilter::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_mta_filter_excludes_rows_without_mta() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let store = db.operations();
    store.insert(&operation("p1").with_mta_id("shop")).await.unwrap();
    store.insert(&operation("p2")).await.unwrap();

    let filter = OperationFilter::new().mta_id("shop").space_id("space-1");
    let ops = store.query(&filter).await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].process_id, "p1");
}

#[tokio::test]
async fn test_mark_cleaned_up_once() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let store = db.operations();
    store.insert(&operation("p1")).await.unwrap();

    assert!(store.mark_cleaned_up("p1").await.unwrap());
    assert!(!store.mark_cleaned_up("p1").await.unwrap());
    let cleaned = OperationFilter::new().cleaned_up(true);
    assert_eq!(store.count(&cleaned).await.unwrap(), 1);
}

#[tokio::test]
async fn test_events_order_ties_by_insertion() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let events = db.events();
    let ts = Utc::now();
    events.append(&HistoricOperationEvent::new("p1", EventType::Aborted).at(ts)).await.unwrap();
    events.append(&HistoricOperationEvent::new("p1", EventType::AbortExecuted).at(ts)).await.unwrap();

    let types: Vec<_> = events
        .list_for_process("p1")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(types, [EventType::Aborted, EventType::AbortExecuted]);
}

#[tokio::test]
async fn test_events_find_older_than_by_type() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let events = db.events();
    let now = Utc::now();
    let old = now - Duration::hours(2);
    events.append(&HistoricOperationEvent::new("p1", EventType::Aborted).at(old)).await.unwrap();
    events.append(&HistoricOperationEvent::new("p1", EventType::Started).at(old)).await.unwrap();
    events.append(&HistoricOperationEvent::new("p2", EventType::Aborted)).await.unwrap();

    let found = events.find_older_than(EventType::Aborted, now - Duration::hours(1)).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].process_id, "p1");

    assert_eq!(events.delete_older_than(now - Duration::hours(1)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_progress_messages_by_type_and_process() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let messages = db.progress_messages();
    messages.add(&ProgressMessage::new("p1", "stage", MessageType::Error, "boom")).await.unwrap();
    messages.add(&ProgressMessage::new("p1", "stage", MessageType::Info, "ok")).await.unwrap();
    messages.add(&ProgressMessage::new("p2", "stage", MessageType::Error, "boom")).await.unwrap();

    assert_eq!(messages.count_by_type("p1", MessageType::Error).await.unwrap(), 1);
    assert_eq!(messages.delete_by_type("p1", MessageType::Error).await.unwrap(), 1);
    assert_eq!(messages.list_for_process("p1").await.unwrap().len(), 1);

    let ids = vec!["p1".to_string(), "p2".to_string()];
    assert_eq!(messages.delete_by_process_ids(&ids).await.unwrap(), 2);
    assert_eq!(messages.delete_by_process_ids(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_by_process_ids_beyond_variable_limit() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let messages = db.progress_messages();
    let logs = db.process_logs();
    let ids: Vec<String> = (0..33_000).map(|i| format!("p{:06}", i)).collect();
    for id in [&ids[0], &ids[MAX_BOUND_IDS], &ids[32_999]] {
        messages.add(&ProgressMessage::new(id, "stage", MessageType::Info, "ok")).await.unwrap();
        logs.add(&ProcessLogEntry::new(id, "space-1", "main.log", "x")).await.unwrap();
    }
    messages.add(&ProgressMessage::new("other", "stage", MessageType::Info, "ok")).await.unwrap();

    assert_eq!(messages.delete_by_process_ids(&ids).await.unwrap(), 3);
    assert_eq!(logs.delete_by_process_ids(&ids).await.unwrap(), 3);
    assert_eq!(messages.list_for_process("other").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_logs_and_files_delete_modified_before() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let now = Utc::now();
    let logs = db.process_logs();
    logs.add(&ProcessLogEntry::new("p1", "space-1", "main.log", "x").at(now - Duration::days(3)))
        .await
        .unwrap();
    logs.add(&ProcessLogEntry::new("p2", "space-1", "main.log", "y")).await.unwrap();
    assert_eq!(logs.delete_modified_before(now - Duration::days(1)).await.unwrap(), 1);
    assert_eq!(logs.list_for_process("p2").await.unwrap().len(), 1);

    let files = db.files();
    files.add(&StoredFile::new("space-1", "app.mtar", 1024).at(now - Duration::days(3))).await.unwrap();
    files.add(&StoredFile::new("space-1", "ext.mtaext", 12)).await.unwrap();
    assert_eq!(files.delete_modified_before(now - Duration::days(1)).await.unwrap(), 1);
    let remaining = files.list("space-1").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].size, 12);
}

#[tokio::test]
async fn test_tokens_replace_and_expire() {
    let db = SqliteDatabase::in_memory().await.unwrap();
    let tokens = db.tokens();
    let now = Utc::now();
    tokens.put(&AccessToken::new("alice", "old", now - Duration::minutes(1))).await.unwrap();
    tokens.put(&AccessToken::new("bob", "fresh", now + Duration::hours(1))).await.unwrap();

    assert_eq!(tokens.delete_expired(now).await.unwrap(), 1);
    assert!(tokens.get("alice").await.unwrap().is_none());

    tokens.put(&AccessToken::new("bob", "newer", now + Duration::hours(2))).await.unwrap();
    assert_eq!(tokens.get("bob").await.unwrap().unwrap().value, "newer");
}
