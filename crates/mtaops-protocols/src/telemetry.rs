//! Telemetry and per-user session protocols.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;
use crate::operation::{Operation, OperationState, ProcessType};

/// Summary of an operation published when it ends abnormally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub process_id: String,
    pub process_type: ProcessType,
    pub space_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mta_id: Option<String>,
    pub final_state: OperationState,
    pub error_count: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl OperationSummary {
    pub fn from_operation(operation: &Operation, final_state: OperationState, error_count: usize) -> Self {
        Self {
            process_id: operation.process_id.clone(),
            process_type: operation.process_type,
            space_id: operation.space_id.clone(),
            mta_id: operation.mta_id.clone(),
            final_state,
            error_count,
            started_at: operation.started_at,
            ended_at: operation.ended_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn duration_secs(&self) -> i64 {
        (self.ended_at - self.started_at).num_seconds()
    }
}

/// Best-effort sink for operation summaries.
#[async_trait]
pub trait TelemetryPublisher: Send + Sync {
    async fn publish(&self, summary: &OperationSummary) -> Result<(), TelemetryError>;
}

/// Cache of remote platform sessions keyed by user.
pub trait ClientSessionCache: Send + Sync {
    /// Drop any cached session bound to `user`. Returns whether one existed.
    fn release(&self, user: &str) -> bool;
}
