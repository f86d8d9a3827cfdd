//! Process engine errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Execution not found: {0}")]
    NotFound(String),

    /// Concurrent engine-side modification; safe to retry.
    #[error("Optimistic lock conflict: {0}")]
    OptimisticLock(String),

    #[error("Deletion of {process_id} did not complete within {waited_ms}ms")]
    DeadlineExceeded { process_id: String, waited_ms: u64 },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Engine API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
}

impl EngineError {
    /// Only optimistic-lock conflicts are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::OptimisticLock(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_optimistic_lock_is_retryable() {
        assert!(EngineError::OptimisticLock("x".into()).is_retryable());
        assert!(!EngineError::NotFound("x".into()).is_retryable());
        assert!(!EngineError::DeadlineExceeded { process_id: "p".into(), waited_ms: 10 }.is_retryable());
        assert!(!EngineError::ApiError { status: 500, message: "boom".into() }.is_retryable());
    }

    #[test]
    fn test_deadline_display() {
        let err = EngineError::DeadlineExceeded { process_id: "p1".into(), waited_ms: 1500 };
        let display = err.to_string();
        assert!(display.contains("p1"));
        assert!(display.contains("1500ms"));
    }
}
