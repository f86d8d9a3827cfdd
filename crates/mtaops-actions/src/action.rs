//! Action identifiers and the process action trait.

use std::fmt;

use async_trait::async_trait;

use mtaops_protocols::error::ActionError;

/// User-facing verbs on an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionId {
    Start,
    Resume,
    Retry,
    Abort,
}

impl ActionId {
    pub const ALL: [ActionId; 4] = [ActionId::Start, ActionId::Resume, ActionId::Retry, ActionId::Abort];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionId::Start => "start",
            ActionId::Resume => "resume",
            ActionId::Retry => "retry",
            ActionId::Abort => "abort",
        }
    }

    /// Parse an external action id. Unknown ids are an illegal state.
    pub fn parse(id: &str) -> Result<Self, ActionError> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == id)
            .ok_or_else(|| ActionError::IllegalState(format!("Unsupported action: {}", id)))
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-facing action on one operation.
#[async_trait]
pub trait ProcessAction: Send + Sync {
    fn action_id(&self) -> ActionId;

    async fn execute(&self, user: &str, process_id: &str) -> Result<(), ActionError>;
}
