use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use mtaops_protocols::engine::variables;
use mtaops_protocols::error::{ActionError, StoreError};
use mtaops_protocols::event::{EventType, HistoricOperationEvent};
use mtaops_protocols::operation::{Operation, OperationState, ProcessType};

use super::{continue_at_wait_points, ensure_not_final, with_lock};
use crate::action::{ActionId, ProcessAction};
use crate::additional::run_additional_actions;
use crate::context::ActionContext;

/// Registers the operation if it is new, then continues it at its wait
/// points.
pub struct StartAction {
    ctx: Arc<ActionContext>,
}

impl StartAction {
    pub fn new(ctx: Arc<ActionContext>) -> Self {
        Self { ctx }
    }

    /// Load the operation, creating a RUNNING row from the engine's view of
    /// the process when none exists.
    async fn ensure_operation(&self, user: &str, process_id: &str) -> Result<Operation, ActionError> {
        if let Some(existing) = self.ctx.operations.get(process_id).await? {
            return Ok(existing);
        }

        let description = self
            .ctx
            .engine
            .describe_process(process_id)
            .await?
            .ok_or_else(|| ActionError::OperationNotFound(process_id.to_string()))?;
        let process_type = ProcessType::from_definition_key(&description.definition_key).ok_or_else(|| {
            ActionError::IllegalState(format!(
                "Process {} has unknown definition {}",
                process_id, description.definition_key
            ))
        })?;

        let space_id = description.string_variable(variables::SPACE_ID).unwrap_or_default();
        let mut operation = Operation::new(process_id, process_type, space_id, user);
        operation.mta_id = description.string_variable(variables::MTA_ID);
        operation.namespace = description.string_variable(variables::NAMESPACE);

        match self.ctx.operations.insert(&operation).await {
            Ok(()) => {
                self.ctx
                    .events
                    .append(&HistoricOperationEvent::new(process_id, EventType::Started))
                    .await?;
                info!("Registered {} operation {}", process_type, process_id);
                Ok(operation)
            }
            // A concurrent start created the row first.
            Err(StoreError::Duplicate(_)) => {
                debug!("Operation {} registered concurrently", process_id);
                self.ctx.load_operation(process_id).await
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ProcessAction for StartAction {
    fn action_id(&self) -> ActionId {
        ActionId::Start
    }

    async fn execute(&self, user: &str, process_id: &str) -> Result<(), ActionError> {
        let operation = self.ensure_operation(user, process_id).await?;
        ensure_not_final(&operation)?;

        let ctx = &self.ctx;
        with_lock(ctx, process_id, || async {
            run_additional_actions(&ctx.additional, ActionId::Start, process_id).await?;
            let continued = continue_at_wait_points(ctx, user, process_id).await?;
            if continued > 0 {
                ctx.operations
                    .transition_state(process_id, &[OperationState::ActionRequired], OperationState::Running, None)
                    .await?;
            }
            Ok(())
        })
        .await
    }
}
