//! Additional actions run before an action body.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use mtaops_protocols::artifact::MessageType;
use mtaops_protocols::engine::{variables, ProcessEngine};
use mtaops_protocols::error::ActionError;
use mtaops_protocols::store::ProgressMessageStore;

use crate::action::ActionId;

/// A preparatory step bound to one action.
#[async_trait]
pub trait AdditionalAction: Send + Sync {
    fn name(&self) -> &str;

    /// The action this step runs before.
    fn applies_to(&self) -> ActionId;

    async fn execute(&self, process_id: &str) -> Result<(), ActionError>;
}

/// Deletes ERROR progress messages so a retry starts from a clean slate.
pub struct ClearErrorMessages {
    messages: Arc<dyn ProgressMessageStore>,
}

impl ClearErrorMessages {
    pub fn new(messages: Arc<dyn ProgressMessageStore>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl AdditionalAction for ClearErrorMessages {
    fn name(&self) -> &str {
        "clear-error-messages"
    }

    fn applies_to(&self) -> ActionId {
        ActionId::Retry
    }

    async fn execute(&self, process_id: &str) -> Result<(), ActionError> {
        let deleted = self.messages.delete_by_type(process_id, MessageType::Error).await?;
        debug!("Cleared {} error messages of {}", deleted, process_id);
        Ok(())
    }
}

/// Marks the root execution as being in its retry phase.
pub struct SetRetryPhase {
    engine: Arc<dyn ProcessEngine>,
}

impl SetRetryPhase {
    pub fn new(engine: Arc<dyn ProcessEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl AdditionalAction for SetRetryPhase {
    fn name(&self) -> &str {
        "set-retry-phase"
    }

    fn applies_to(&self) -> ActionId {
        ActionId::Retry
    }

    async fn execute(&self, process_id: &str) -> Result<(), ActionError> {
        self.engine
            .set_variable(
                process_id,
                variables::STEP_PHASE,
                Value::String(variables::STEP_PHASE_RETRY.to_string()),
            )
            .await?;
        Ok(())
    }
}

/// Flags the root execution as aborted so running steps can stop early.
/// Best effort: the tree may already be gone.
pub struct SetAbortFlag {
    engine: Arc<dyn ProcessEngine>,
}

impl SetAbortFlag {
    pub fn new(engine: Arc<dyn ProcessEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl AdditionalAction for SetAbortFlag {
    fn name(&self) -> &str {
        "set-abort-flag"
    }

    fn applies_to(&self) -> ActionId {
        ActionId::Abort
    }

    async fn execute(&self, process_id: &str) -> Result<(), ActionError> {
        if let Err(e) = self
            .engine
            .set_variable(process_id, variables::PROCESS_ABORTED, Value::Bool(true))
            .await
        {
            warn!("Could not flag {} as aborted: {}", process_id, e);
        }
        Ok(())
    }
}

/// The registered additional actions, in execution order.
pub fn default_additional_actions(
    messages: Arc<dyn ProgressMessageStore>,
    engine: Arc<dyn ProcessEngine>,
) -> Vec<Arc<dyn AdditionalAction>> {
    vec![
        Arc::new(ClearErrorMessages::new(messages)),
        Arc::new(SetRetryPhase::new(engine.clone())),
        Arc::new(SetAbortFlag::new(engine)),
    ]
}

/// Run every additional action registered for `action`, in order.
pub async fn run_additional_actions(
    additional: &[Arc<dyn AdditionalAction>],
    action: ActionId,
    process_id: &str,
) -> Result<(), ActionError> {
    for step in additional.iter().filter(|step| step.applies_to() == action) {
        debug!("Running {} before {} of {}", step.name(), action, process_id);
        step.execute(process_id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtaops_engine::InMemoryProcessEngine;
    use mtaops_protocols::artifact::ProgressMessage;
    use mtaops_protocols::engine::Variables;
    use mtaops_store::MemoryProgressMessageStore;

    #[tokio::test]
    async fn test_retry_steps_clear_errors_and_set_phase() {
        let messages = Arc::new(MemoryProgressMessageStore::new());
        messages.add(&ProgressMessage::new("p1", "deploy", MessageType::Error, "boom")).await.unwrap();
        messages.add(&ProgressMessage::new("p1", "deploy", MessageType::Info, "ok")).await.unwrap();
        let engine = Arc::new(InMemoryProcessEngine::new());
        engine.add_process("p1", "xs2-deploy", Variables::new());

        let steps = default_additional_actions(messages.clone(), engine.clone());
        run_additional_actions(&steps, ActionId::Retry, "p1").await.unwrap();

        assert_eq!(messages.count_by_type("p1", MessageType::Error).await.unwrap(), 0);
        assert_eq!(messages.count_by_type("p1", MessageType::Info).await.unwrap(), 1);
        assert_eq!(engine.variable("p1", "stepPhase"), Some(Value::String("RETRY".into())));
        assert_eq!(engine.variable("p1", "processAborted"), None);
    }

    #[tokio::test]
    async fn test_abort_flag_tolerates_missing_execution() {
        let messages = Arc::new(MemoryProgressMessageStore::new());
        let engine = Arc::new(InMemoryProcessEngine::new());
        let steps = default_additional_actions(messages, engine);

        run_additional_actions(&steps, ActionId::Abort, "gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_no_steps_for_resume() {
        let messages = Arc::new(MemoryProgressMessageStore::new());
        messages.add(&ProgressMessage::new("p1", "deploy", MessageType::Error, "boom")).await.unwrap();
        let engine = Arc::new(InMemoryProcessEngine::new());
        let steps = default_additional_actions(messages.clone(), engine);

        run_additional_actions(&steps, ActionId::Resume, "p1").await.unwrap();
        assert_eq!(messages.count_by_type("p1", MessageType::Error).await.unwrap(), 1);
    }
}
