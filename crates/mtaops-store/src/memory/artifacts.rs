//! In-memory artifact stores.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use mtaops_protocols::artifact::{AccessToken, MessageType, ProcessLogEntry, ProgressMessage, StepAnalytics, StoredFile};
use mtaops_protocols::error::StoreError;
use mtaops_protocols::store::{AnalyticsStore, FileStore, ProcessLogStore, ProgressMessageStore, TokenStore};

/// Remove every element matching `pred`, returning how many were removed.
fn remove_where<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> usize {
    let before = items.len();
    items.retain(|item| !pred(item));
    before - items.len()
}

#[derive(Default)]
pub struct MemoryProgressMessageStore {
    messages: RwLock<Vec<ProgressMessage>>,
}

impl MemoryProgressMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressMessageStore for MemoryProgressMessageStore {
    async fn add(&self, message: &ProgressMessage) -> Result<(), StoreError> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<ProgressMessage>, StoreError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().filter(|m| m.process_id == process_id).cloned().collect())
    }

    async fn count_by_type(&self, process_id: &str, message_type: MessageType) -> Result<usize, StoreError> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .filter(|m| m.process_id == process_id && m.message_type == message_type)
            .count())
    }

    async fn delete_by_type(&self, process_id: &str, message_type: MessageType) -> Result<usize, StoreError> {
        let mut messages = self.messages.write().await;
        Ok(remove_where(&mut messages, |m| {
            m.process_id == process_id && m.message_type == message_type
        }))
    }

    async fn delete_by_process_ids(&self, process_ids: &[String]) -> Result<usize, StoreError> {
        let mut messages = self.messages.write().await;
        Ok(remove_where(&mut messages, |m| process_ids.contains(&m.process_id)))
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut messages = self.messages.write().await;
        Ok(remove_where(&mut messages, |m| m.timestamp < cutoff))
    }
}

#[derive(Default)]
pub struct MemoryProcessLogStore {
    logs: RwLock<Vec<ProcessLogEntry>>,
}

impl MemoryProcessLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessLogStore for MemoryProcessLogStore {
    async fn add(&self, entry: &ProcessLogEntry) -> Result<(), StoreError> {
        self.logs.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<ProcessLogEntry>, StoreError> {
        let logs = self.logs.read().await;
        Ok(logs.iter().filter(|l| l.process_id == process_id).cloned().collect())
    }

    async fn delete_by_process_ids(&self, process_ids: &[String]) -> Result<usize, StoreError> {
        let mut logs = self.logs.write().await;
        Ok(remove_where(&mut logs, |l| process_ids.contains(&l.process_id)))
    }

    async fn delete_modified_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut logs = self.logs.write().await;
        Ok(remove_where(&mut logs, |l| l.modified_at < cutoff))
    }
}

#[derive(Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<String, StoredFile>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn add(&self, file: &StoredFile) -> Result<(), StoreError> {
        self.files.write().await.insert(file.id.clone(), file.clone());
        Ok(())
    }

    async fn list(&self, space_id: &str) -> Result<Vec<StoredFile>, StoreError> {
        let files = self.files.read().await;
        let mut listed: Vec<_> = files.values().filter(|f| f.space_id == space_id).cloned().collect();
        listed.sort_by_key(|f| f.modified_at);
        Ok(listed)
    }

    async fn delete_modified_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut files = self.files.write().await;
        let before = files.len();
        files.retain(|_, f| f.modified_at >= cutoff);
        Ok(before - files.len())
    }
}

#[derive(Default)]
pub struct MemoryAnalyticsStore {
    samples: RwLock<Vec<StepAnalytics>>,
}

impl MemoryAnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalyticsStore for MemoryAnalyticsStore {
    async fn record(&self, sample: &StepAnalytics) -> Result<(), StoreError> {
        self.samples.write().await.push(sample.clone());
        Ok(())
    }

    async fn list_for_process(&self, process_id: &str) -> Result<Vec<StepAnalytics>, StoreError> {
        let samples = self.samples.read().await;
        Ok(samples.iter().filter(|s| s.process_id == process_id).cloned().collect())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut samples = self.samples.write().await;
        Ok(remove_where(&mut samples, |s| s.recorded_at < cutoff))
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, AccessToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn put(&self, token: &AccessToken) -> Result<(), StoreError> {
        self.tokens.write().await.insert(token.user.clone(), token.clone());
        Ok(())
    }

    async fn get(&self, user: &str) -> Result<Option<AccessToken>, StoreError> {
        Ok(self.tokens.read().await.get(user).cloned())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired(now));
        Ok(before - tokens.len())
    }
}
