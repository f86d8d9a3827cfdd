//! Telemetry publishing.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use mtaops_protocols::error::TelemetryError;
use mtaops_protocols::telemetry::{OperationSummary, TelemetryPublisher};

use crate::workers::WorkerPool;

/// Emits each summary as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetryPublisher;

#[async_trait]
impl TelemetryPublisher for TracingTelemetryPublisher {
    async fn publish(&self, summary: &OperationSummary) -> Result<(), TelemetryError> {
        let payload = serde_json::to_string(summary)?;
        info!(
            target: "mtaops::telemetry",
            process_id = %summary.process_id,
            process_type = %summary.process_type,
            final_state = %summary.final_state,
            error_count = summary.error_count,
            duration_secs = summary.duration_secs(),
            "{}",
            payload
        );
        Ok(())
    }
}

/// Publish `summary` on the worker pool. Failures are logged and dropped.
pub fn publish_in_background(
    workers: &WorkerPool,
    publisher: Arc<dyn TelemetryPublisher>,
    summary: OperationSummary,
) {
    let process_id = summary.process_id.clone();
    let queued = workers.submit("telemetry", async move {
        if let Err(e) = publisher.publish(&summary).await {
            warn!("Failed to publish telemetry for {}: {}", summary.process_id, e);
        }
    });
    if !queued {
        warn!("Telemetry for {} not published: worker pool is shut down", process_id);
    }
}
