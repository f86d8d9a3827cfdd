//! Starting new operations.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use mtaops_protocols::engine::{variables, Variables};
use mtaops_protocols::error::ActionError;
use mtaops_protocols::event::{EventType, HistoricOperationEvent};
use mtaops_protocols::operation::{Operation, ProcessType};

use crate::context::ActionContext;

/// Starts engine processes and registers their operations.
pub struct OperationLauncher {
    ctx: Arc<ActionContext>,
}

impl OperationLauncher {
    pub fn new(ctx: Arc<ActionContext>) -> Self {
        Self { ctx }
    }

    /// Start a `process_type` process in `space_id` for `user`.
    ///
    /// `mtaId` and `namespace` in `vars` are copied onto the operation
    /// row. The user and space always override caller-supplied values.
    pub async fn launch(
        &self,
        process_type: ProcessType,
        user: &str,
        space_id: &str,
        mut vars: Variables,
    ) -> Result<Operation, ActionError> {
        vars.insert(variables::USER.to_string(), Value::String(user.to_string()));
        vars.insert(variables::SPACE_ID.to_string(), Value::String(space_id.to_string()));
        let mta_id = string_variable(&vars, variables::MTA_ID);
        let namespace = string_variable(&vars, variables::NAMESPACE);

        let process_id = self
            .ctx
            .engine
            .start_process(process_type.definition_key(), vars)
            .await?;

        let mut operation = Operation::new(&process_id, process_type, space_id, user);
        operation.mta_id = mta_id;
        operation.namespace = namespace;
        self.ctx.operations.insert(&operation).await?;
        self.ctx
            .events
            .append(&HistoricOperationEvent::new(&process_id, EventType::Started))
            .await?;

        info!("{} started {} operation {} in {}", user, process_type, process_id, space_id);
        Ok(operation)
    }
}

fn string_variable(vars: &Variables, name: &str) -> Option<String> {
    vars.get(name).and_then(Value::as_str).map(str::to_string)
}
