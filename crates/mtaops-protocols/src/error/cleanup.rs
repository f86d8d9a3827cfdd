//! Cleanup errors.

use thiserror::Error;

use super::{ActionError, EngineError, StoreError};

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("{0}")]
    Custom(String),
}
