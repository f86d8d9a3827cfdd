use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use mtaops_protocols::artifact::MessageType;
use mtaops_protocols::error::ActionError;
use mtaops_protocols::event::{EventType, HistoricOperationEvent};
use mtaops_protocols::operation::OperationState;
use mtaops_protocols::telemetry::OperationSummary;

use crate::action::{ActionId, ProcessAction};
use crate::additional::run_additional_actions;
use crate::context::ActionContext;
use crate::telemetry::publish_in_background;

/// Reason handed to the engine when tearing an aborted tree down.
pub const ABORT_REASON: &str = "ABORTED";

/// Terminates an operation and tears its execution tree down.
///
/// Abort does not take the operation lock: it must be able to interrupt an
/// operation whose lock is held by a running action. The ABORTED transition
/// is the guard instead, so only one concurrent abort gets past it.
pub struct AbortAction {
    ctx: Arc<ActionContext>,
}

impl AbortAction {
    pub fn new(ctx: Arc<ActionContext>) -> Self {
        Self { ctx }
    }

    async fn publish_summary(&self, process_id: &str) {
        let errors = match self.ctx.progress_messages.count_by_type(process_id, MessageType::Error).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Could not count error messages of {}: {}", process_id, e);
                return;
            }
        };
        if errors == 0 {
            return;
        }
        match self.ctx.operations.get(process_id).await {
            Ok(Some(operation)) => {
                let summary = OperationSummary::from_operation(&operation, OperationState::Aborted, errors);
                publish_in_background(&self.ctx.workers, self.ctx.telemetry.clone(), summary);
            }
            Ok(None) => {}
            Err(e) => warn!("Could not reload {} for telemetry: {}", process_id, e),
        }
    }
}

#[async_trait]
impl ProcessAction for AbortAction {
    fn action_id(&self) -> ActionId {
        ActionId::Abort
    }

    async fn execute(&self, user: &str, process_id: &str) -> Result<(), ActionError> {
        let ctx = &self.ctx;
        let operation = ctx.load_operation(process_id).await?;
        if operation.is_final() {
            info!("Operation {} is already {}, nothing to abort", process_id, operation.state);
            ctx.conflict.attempt_to_release_lock(process_id).await;
            return Ok(());
        }

        run_additional_actions(&ctx.additional, ActionId::Abort, process_id).await?;
        ctx.conflict.attempt_to_release_lock(process_id).await;

        let aborted = ctx
            .operations
            .transition_state(
                process_id,
                &OperationState::non_final_states(),
                OperationState::Aborted,
                Some(Utc::now()),
            )
            .await?;
        if !aborted {
            info!("Operation {} was ended concurrently, abort is a no-op", process_id);
            return Ok(());
        }
        ctx.events
            .append(&HistoricOperationEvent::new(process_id, EventType::Aborted))
            .await?;

        ctx.engine.delete_execution_tree(process_id, ABORT_REASON).await?;
        ctx.events
            .append(&HistoricOperationEvent::new(process_id, EventType::AbortExecuted))
            .await?;
        info!("{} aborted operation {}", user, process_id);

        self.publish_summary(process_id).await;
        Ok(())
    }
}
