//! Time-based cleaners over the per-operation artifact stores.
//!
//! Each one deletes from its own store only and is independent of the rest.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use mtaops_protocols::error::CleanupError;
use mtaops_protocols::store::{
    AnalyticsStore, FileStore, HistoricEventStore, ProcessLogStore, ProgressMessageStore, TokenStore,
};

use crate::cleaner::{Cleaner, PRIORITY_ARTIFACTS, PRIORITY_OPERATIONS};

/// Drops cached access tokens that have expired. Token expiry is absolute,
/// so the retention cutoff does not apply.
pub struct TokenCleaner {
    tokens: Arc<dyn TokenStore>,
}

impl TokenCleaner {
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Cleaner for TokenCleaner {
    fn name(&self) -> &str {
        "tokens"
    }

    fn priority(&self) -> u32 {
        PRIORITY_OPERATIONS
    }

    async fn execute(&self, _expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let deleted = self.tokens.delete_expired(Utc::now()).await?;
        info!("Deleted {} expired access tokens", deleted);
        Ok(deleted)
    }
}

pub struct FilesCleaner {
    files: Arc<dyn FileStore>,
}

impl FilesCleaner {
    pub fn new(files: Arc<dyn FileStore>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl Cleaner for FilesCleaner {
    fn name(&self) -> &str {
        "files"
    }

    fn priority(&self) -> u32 {
        PRIORITY_ARTIFACTS
    }

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let deleted = self.files.delete_modified_before(expiration).await?;
        info!("Deleted {} files modified before {}", deleted, expiration);
        Ok(deleted)
    }
}

pub struct ProcessLogsCleaner {
    logs: Arc<dyn ProcessLogStore>,
}

impl ProcessLogsCleaner {
    pub fn new(logs: Arc<dyn ProcessLogStore>) -> Self {
        Self { logs }
    }
}

#[async_trait]
impl Cleaner for ProcessLogsCleaner {
    fn name(&self) -> &str {
        "process-logs"
    }

    fn priority(&self) -> u32 {
        PRIORITY_ARTIFACTS
    }

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let deleted = self.logs.delete_modified_before(expiration).await?;
        info!("Deleted {} process logs modified before {}", deleted, expiration);
        Ok(deleted)
    }
}

pub struct ProgressMessagesCleaner {
    messages: Arc<dyn ProgressMessageStore>,
}

impl ProgressMessagesCleaner {
    pub fn new(messages: Arc<dyn ProgressMessageStore>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl Cleaner for ProgressMessagesCleaner {
    fn name(&self) -> &str {
        "progress-messages"
    }

    fn priority(&self) -> u32 {
        PRIORITY_ARTIFACTS
    }

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let deleted = self.messages.delete_older_than(expiration).await?;
        info!("Deleted {} progress messages older than {}", deleted, expiration);
        Ok(deleted)
    }
}

pub struct StepAnalyticsCleaner {
    analytics: Arc<dyn AnalyticsStore>,
}

impl StepAnalyticsCleaner {
    pub fn new(analytics: Arc<dyn AnalyticsStore>) -> Self {
        Self { analytics }
    }
}

#[async_trait]
impl Cleaner for StepAnalyticsCleaner {
    fn name(&self) -> &str {
        "step-analytics"
    }

    fn priority(&self) -> u32 {
        PRIORITY_ARTIFACTS
    }

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let deleted = self.analytics.delete_older_than(expiration).await?;
        info!("Deleted {} step analytics older than {}", deleted, expiration);
        Ok(deleted)
    }
}

pub struct HistoricOperationEventsCleaner {
    events: Arc<dyn HistoricEventStore>,
}

impl HistoricOperationEventsCleaner {
    pub fn new(events: Arc<dyn HistoricEventStore>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Cleaner for HistoricOperationEventsCleaner {
    fn name(&self) -> &str {
        "historic-operation-events"
    }

    fn priority(&self) -> u32 {
        PRIORITY_ARTIFACTS
    }

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError> {
        let deleted = self.events.delete_older_than(expiration).await?;
        info!("Deleted {} historic operation events older than {}", deleted, expiration);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mtaops_protocols::artifact::{AccessToken, StepAnalytics, StoredFile};
    use mtaops_store::{MemoryAnalyticsStore, MemoryFileStore, MemoryTokenStore};

    #[tokio::test]
    async fn test_token_cleaner_ignores_retention() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let now = Utc::now();
        tokens.put(&AccessToken::new("alice", "a", now - Duration::minutes(1))).await.unwrap();
        tokens.put(&AccessToken::new("bob", "b", now + Duration::hours(1))).await.unwrap();

        let cleaner = TokenCleaner::new(tokens.clone());
        // A cutoff far in the past still drops tokens that expired just now.
        let deleted = cleaner.execute(now - Duration::days(365)).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(tokens.get("alice").await.unwrap().is_none());
        assert!(tokens.get("bob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_files_cleaner_uses_cutoff() {
        let files = Arc::new(MemoryFileStore::new());
        let now = Utc::now();
        files.add(&StoredFile::new("space-1", "old.mtar", 10).at(now - Duration::days(9))).await.unwrap();
        files.add(&StoredFile::new("space-1", "new.mtar", 10).at(now)).await.unwrap();

        let deleted = FilesCleaner::new(files.clone())
            .execute(now - Duration::days(7))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        let left = files.list("space-1").await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "new.mtar");
    }

    #[tokio::test]
    async fn test_analytics_cleaner() {
        let analytics = Arc::new(MemoryAnalyticsStore::new());
        let now = Utc::now();
        analytics.record(&StepAnalytics::new("p1", "deploy", 5).at(now - Duration::days(3))).await.unwrap();
        analytics.record(&StepAnalytics::new("p1", "stage", 5).at(now)).await.unwrap();

        let cleaner = StepAnalyticsCleaner::new(analytics.clone());
        assert_eq!(cleaner.priority(), PRIORITY_ARTIFACTS);
        assert_eq!(cleaner.execute(now - Duration::days(1)).await.unwrap(), 1);
        assert_eq!(analytics.list_for_process("p1").await.unwrap().len(), 1);
    }
}
