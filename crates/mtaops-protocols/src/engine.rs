//! Process engine protocol.
//!
//! The workflow engine is an external collaborator. The controller talks to it
//! only through [`ProcessEngine`]; a concrete client is bound at the
//! composition root.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Process variables exchanged with the engine.
pub type Variables = HashMap<String, serde_json::Value>;

/// Well-known process variable names.
pub mod variables {
    /// User the process currently acts on behalf of.
    pub const USER: &str = "user";
    pub const SPACE_ID: &str = "spaceId";
    pub const NAMESPACE: &str = "namespace";
    pub const MTA_ID: &str = "mtaId";
    /// Sub-phase marker read by steps that behave differently on retry.
    pub const STEP_PHASE: &str = "stepPhase";
    pub const STEP_PHASE_RETRY: &str = "RETRY";
    /// Set before teardown so steps can skip further work.
    pub const PROCESS_ABORTED: &str = "processAborted";
}

/// Static description of a root process instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessDescription {
    pub process_id: String,
    pub definition_key: String,
    #[serde(default)]
    pub variables: Variables,
}

impl ProcessDescription {
    pub fn string_variable(&self, name: &str) -> Option<String> {
        self.variables.get(name).and_then(|v| v.as_str()).map(str::to_string)
    }
}

/// Narrow adapter onto the external workflow engine.
#[async_trait]
pub trait ProcessEngine: Send + Sync {
    /// Start a new root process instance and return its id.
    async fn start_process(&self, definition_key: &str, variables: Variables) -> Result<String, EngineError>;

    /// Describe a root process instance, or `None` if the engine has no
    /// record of it.
    async fn describe_process(&self, process_id: &str) -> Result<Option<ProcessDescription>, EngineError>;

    /// Ids of the still-active sub-processes under `root_id`, in creation
    /// order (outermost first).
    async fn active_sub_executions(&self, root_id: &str) -> Result<Vec<String>, EngineError>;

    /// Ids of every historic sub-process under `root_id`, finished or not.
    async fn historic_sub_executions(&self, root_id: &str) -> Result<Vec<String>, EngineError>;

    /// Executions of `process_id` parked at one of the named wait points.
    async fn executions_at_wait_point(&self, process_id: &str) -> Result<Vec<String>, EngineError>;

    /// Signal continuation of an execution parked at a wait point.
    async fn trigger_at_wait_point(&self, execution_id: &str, variables: Variables) -> Result<(), EngineError>;

    /// Ids of dead-letter work items belonging to `process_id`.
    async fn dead_letter_work(&self, process_id: &str) -> Result<Vec<String>, EngineError>;

    /// Move a dead-letter work item back to executable with `retries` left.
    async fn move_to_executable(&self, work_id: &str, retries: u32) -> Result<(), EngineError>;

    /// Delete the whole execution tree rooted at `process_id`. Retries on
    /// optimistic-lock conflicts until a deadline, then fails with
    /// [`EngineError::DeadlineExceeded`].
    async fn delete_execution_tree(&self, process_id: &str, reason: &str) -> Result<(), EngineError>;

    /// Whether the root process no longer has a live execution tree.
    async fn is_finished(&self, root_id: &str) -> Result<bool, EngineError>;

    async fn get_variable(&self, execution_id: &str, name: &str) -> Result<Option<serde_json::Value>, EngineError>;

    async fn set_variable(&self, execution_id: &str, name: &str, value: serde_json::Value) -> Result<(), EngineError>;

    /// Finished root processes started before `cutoff`, paged.
    async fn finished_processes_started_before(
        &self,
        cutoff: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>, EngineError>;

    /// Delete the engine's historic data for one process instance.
    async fn delete_historic_data(&self, process_id: &str) -> Result<(), EngineError>;
}
