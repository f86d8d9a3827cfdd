use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use mtaops_protocols::error::ActionError;
use mtaops_protocols::event::{EventType, HistoricOperationEvent};
use mtaops_protocols::operation::OperationState;

use super::{continue_at_wait_points, ensure_not_final, with_lock};
use crate::action::{ActionId, ProcessAction};
use crate::additional::run_additional_actions;
use crate::context::ActionContext;

/// Continues an operation parked at a manual wait point.
pub struct ResumeAction {
    ctx: Arc<ActionContext>,
}

impl ResumeAction {
    pub fn new(ctx: Arc<ActionContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ProcessAction for ResumeAction {
    fn action_id(&self) -> ActionId {
        ActionId::Resume
    }

    async fn execute(&self, user: &str, process_id: &str) -> Result<(), ActionError> {
        let operation = self.ctx.load_operation(process_id).await?;
        ensure_not_final(&operation)?;

        let ctx = &self.ctx;
        with_lock(ctx, process_id, || async {
            run_additional_actions(&ctx.additional, ActionId::Resume, process_id).await?;
            let continued = continue_at_wait_points(ctx, user, process_id).await?;
            if continued == 0 {
                return Ok(());
            }

            ctx.operations
                .transition_state(process_id, &[OperationState::ActionRequired], OperationState::Running, None)
                .await?;
            ctx.events
                .append(&HistoricOperationEvent::new(process_id, EventType::Resumed))
                .await?;
            info!("Resumed {} wait points of {} for {}", continued, process_id, user);
            Ok(())
        })
        .await
    }
}
