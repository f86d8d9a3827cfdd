//! Cleanup and action configuration types.

use serde::{Deserialize, Serialize};

use super::default_true;

/// How stale active operations are reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationsStrategy {
    /// Abort stale operations newest first, delete expired rows at the end of
    /// the sweep.
    #[default]
    Active,
    /// Page through stale operations by process id, then bulk-delete rows.
    Paginated,
}

/// Scheduled cleanup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression (6 fields including seconds).
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// Data older than this many days is reclaimed.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default)]
    pub operations_strategy: OperationsStrategy,

    /// Page size for paginated sweeps.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Age an ABORTED event must reach before its leftover execution tree is
    /// force-deleted.
    #[serde(default = "default_aborted_grace_minutes")]
    pub aborted_grace_minutes: u32,
}

fn default_schedule() -> String {
    "0 0 3 * * *".to_string()
}

fn default_retention_days() -> u32 {
    5
}

fn default_page_size() -> usize {
    100
}

fn default_aborted_grace_minutes() -> u32 {
    30
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            schedule: default_schedule(),
            retention_days: default_retention_days(),
            operations_strategy: OperationsStrategy::default(),
            page_size: default_page_size(),
            aborted_grace_minutes: default_aborted_grace_minutes(),
        }
    }
}

/// Process action configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Workers in the background pool used for best-effort work.
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,
}

fn default_max_workers() -> u32 {
    4
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}
