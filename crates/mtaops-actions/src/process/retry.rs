use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use mtaops_protocols::error::ActionError;
use mtaops_protocols::event::{EventType, HistoricOperationEvent};
use mtaops_protocols::operation::OperationState;

use super::{discover_executions, ensure_not_final, with_lock};
use crate::action::{ActionId, ProcessAction};
use crate::additional::run_additional_actions;
use crate::context::ActionContext;

/// Moves dead-letter work of a failed operation back to executable.
pub struct RetryAction {
    ctx: Arc<ActionContext>,
}

impl RetryAction {
    pub fn new(ctx: Arc<ActionContext>) -> Self {
        Self { ctx }
    }

    /// Requeue the dead-letter work of one execution with no automatic
    /// retries left, so a repeated failure surfaces at once.
    async fn retry_execution(&self, execution_id: &str) -> Result<usize, ActionError> {
        let work = self.ctx.engine.dead_letter_work(execution_id).await?;
        for work_id in &work {
            self.ctx.engine.move_to_executable(work_id, 0).await?;
        }
        Ok(work.len())
    }
}

#[async_trait]
impl ProcessAction for RetryAction {
    fn action_id(&self) -> ActionId {
        ActionId::Retry
    }

    async fn execute(&self, user: &str, process_id: &str) -> Result<(), ActionError> {
        let operation = self.ctx.load_operation(process_id).await?;
        ensure_not_final(&operation)?;

        let ctx = &self.ctx;
        with_lock(ctx, process_id, || async {
            run_additional_actions(&ctx.additional, ActionId::Retry, process_id).await?;

            // Innermost first: a nested failure is retried before its parent.
            let mut executions = discover_executions(ctx, process_id).await?;
            executions.reverse();

            let mut requeued = 0;
            for execution in &executions {
                match self.retry_execution(execution).await {
                    Ok(count) => {
                        debug!("Requeued {} work items of {}", count, execution);
                        requeued += count;
                    }
                    Err(e) => warn!("Failed to retry execution {} of {}: {}", execution, process_id, e),
                }
            }

            ctx.events
                .append(&HistoricOperationEvent::new(process_id, EventType::Retried))
                .await?;
            ctx.operations
                .transition_state(process_id, &[OperationState::Error], OperationState::Running, None)
                .await?;
            info!("{} retried {} ({} work items requeued)", user, process_id, requeued);
            Ok(())
        })
        .await
    }
}
