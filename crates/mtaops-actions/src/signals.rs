//! Engine lifecycle notifications.
//!
//! The workflow engine reports wait points, completion and failure. Each
//! notification moves the operation along one edge of the state machine and
//! drops any lock still held for it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use mtaops_protocols::error::ActionError;
use mtaops_protocols::event::{EventType, HistoricOperationEvent};
use mtaops_protocols::operation::OperationState;

use crate::context::ActionContext;

pub struct EngineSignalHandler {
    ctx: Arc<ActionContext>,
}

impl EngineSignalHandler {
    pub fn new(ctx: Arc<ActionContext>) -> Self {
        Self { ctx }
    }

    /// The process parked at a manual wait point.
    pub async fn on_wait_point(&self, process_id: &str) -> Result<(), ActionError> {
        self.apply(process_id, OperationState::ActionRequired, None).await
    }

    /// The process completed normally.
    pub async fn on_finished(&self, process_id: &str) -> Result<(), ActionError> {
        self.apply(process_id, OperationState::Finished, Some(EventType::Finished))
            .await
    }

    /// The process failed with an uncaught error. `content_error` separates
    /// failures caused by the deployed content from infrastructure ones.
    pub async fn on_failed(&self, process_id: &str, content_error: bool) -> Result<(), ActionError> {
        let event = if content_error {
            EventType::FailedByContentError
        } else {
            EventType::FailedByInfrastructureError
        };
        self.apply(process_id, OperationState::Error, Some(event)).await
    }

    async fn apply(
        &self,
        process_id: &str,
        state: OperationState,
        event: Option<EventType>,
    ) -> Result<(), ActionError> {
        let operation = self.ctx.load_operation(process_id).await?;
        if operation.state == state {
            debug!("Operation {} already {}, ignoring repeated signal", process_id, state);
            self.ctx.conflict.attempt_to_release_lock(process_id).await;
            return Ok(());
        }

        if let Err(e) = self.ctx.conflict.release_lock(process_id, state).await {
            warn!("Rejected {} signal for {}: {}", state, process_id, e);
            self.ctx.conflict.attempt_to_release_lock(process_id).await;
            return Err(e);
        }

        if let Some(event) = event {
            self.ctx
                .events
                .append(&HistoricOperationEvent::new(process_id, event))
                .await?;
        }
        info!("Operation {} is now {}", process_id, state);
        Ok(())
    }
}
