//! Runs the cleaner chain.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::cleaner::Cleaner;

/// Result of one cleaner within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanerOutcome {
    Cleaned(usize),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanerReport {
    pub name: String,
    pub priority: u32,
    pub outcome: CleanerOutcome,
}

/// Outcome of every cleaner in one run, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub expiration: Option<DateTime<Utc>>,
    pub cleaners: Vec<CleanerReport>,
}

impl CleanupReport {
    pub fn get(&self, name: &str) -> Option<&CleanerOutcome> {
        self.cleaners.iter().find(|c| c.name == name).map(|c| &c.outcome)
    }

    /// Items removed by the cleaners that succeeded.
    pub fn total_cleaned(&self) -> usize {
        self.cleaners
            .iter()
            .filter_map(|c| match c.outcome {
                CleanerOutcome::Cleaned(count) => Some(count),
                CleanerOutcome::Failed(_) => None,
            })
            .sum()
    }

    pub fn failures(&self) -> Vec<&CleanerReport> {
        self.cleaners
            .iter()
            .filter(|c| matches!(c.outcome, CleanerOutcome::Failed(_)))
            .collect()
    }
}

/// Ordered list of cleaners. A failing cleaner never stops the ones after it.
pub struct CleanupCoordinator {
    cleaners: Vec<Arc<dyn Cleaner>>,
}

impl CleanupCoordinator {
    /// Cleaners run by ascending priority; equal priorities keep the given
    /// order.
    pub fn new(mut cleaners: Vec<Arc<dyn Cleaner>>) -> Self {
        cleaners.sort_by_key(|c| c.priority());
        Self { cleaners }
    }

    /// Names in execution order.
    pub fn cleaner_names(&self) -> Vec<&str> {
        self.cleaners.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.cleaners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cleaners.is_empty()
    }

    /// Run every cleaner against `expiration`.
    pub async fn execute(&self, expiration: DateTime<Utc>) -> CleanupReport {
        info!("Running {} cleaners for data older than {}", self.cleaners.len(), expiration);
        let mut report = CleanupReport {
            expiration: Some(expiration),
            cleaners: Vec::with_capacity(self.cleaners.len()),
        };

        for cleaner in &self.cleaners {
            let outcome = match cleaner.execute(expiration).await {
                Ok(count) => CleanerOutcome::Cleaned(count),
                Err(e) => {
                    error!("Cleaner {} failed: {}", cleaner.name(), e);
                    CleanerOutcome::Failed(e.to_string())
                }
            };
            report.cleaners.push(CleanerReport {
                name: cleaner.name().to_string(),
                priority: cleaner.priority(),
                outcome,
            });
        }

        info!(
            "Cleanup finished: {} items removed, {} cleaners failed",
            report.total_cleaned(),
            report.failures().len()
        );
        report
    }
}
