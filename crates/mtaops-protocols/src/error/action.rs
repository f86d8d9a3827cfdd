//! Process action errors.

use thiserror::Error;

use super::{EngineError, StoreError};
use crate::operation::OperationState;

#[derive(Debug, Error)]
pub enum ActionError {
    /// Unknown action id or an otherwise impossible request.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    /// Another mutating action or a conflicting operation holds the lock.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: OperationState, to: OperationState },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_state_display() {
        let err = ActionError::IllegalState("Unsupported action: pause".to_string());
        assert!(err.to_string().contains("pause"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = ActionError::InvalidTransition {
            from: OperationState::Finished,
            to: OperationState::Running,
        };
        assert_eq!(err.to_string(), "Invalid state transition from FINISHED to RUNNING");
    }

    #[test]
    fn test_from_store_error() {
        let err: ActionError = StoreError::QueryError("locked".into()).into();
        assert!(matches!(err, ActionError::Store(_)));
    }
}
