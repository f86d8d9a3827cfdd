//! Per-operation exclusivity.
//!
//! The `has_acquired_lock` flag on the operation row is the only lock. It is
//! toggled with the store's compare-and-set, so two callers can never both
//! observe themselves as the owner.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use mtaops_protocols::error::ActionError;
use mtaops_protocols::operation::{Operation, OperationFilter, OperationState};
use mtaops_protocols::store::OperationStore;

#[derive(Clone)]
pub struct ConflictPreventer {
    operations: Arc<dyn OperationStore>,
}

impl ConflictPreventer {
    pub fn new(operations: Arc<dyn OperationStore>) -> Self {
        Self { operations }
    }

    async fn load(&self, process_id: &str) -> Result<Operation, ActionError> {
        self.operations
            .get(process_id)
            .await?
            .ok_or_else(|| ActionError::OperationNotFound(process_id.to_string()))
    }

    /// Take the lock of `process_id`.
    ///
    /// Fails with [`ActionError::Conflict`] when the lock is already held, or
    /// when another live operation on the same MTA holds its own lock.
    pub async fn acquire_lock(&self, process_id: &str) -> Result<(), ActionError> {
        let operation = self.load(process_id).await?;

        if let Some(mta_id) = &operation.mta_id {
            let filter = OperationFilter::new()
                .mta_id(mta_id.clone())
                .space_id(operation.space_id.clone())
                .acquired_lock(true)
                .in_non_final_state();
            let holders = self.operations.query(&filter).await?;
            if let Some(other) = holders
                .iter()
                .find(|other| other.process_id != process_id && other.targets_same_mta(&operation))
            {
                return Err(ActionError::Conflict(format!(
                    "operation {} is already modifying MTA {} in space {}",
                    other.process_id, mta_id, operation.space_id
                )));
            }
        }

        if !self.operations.compare_and_set_lock(process_id, false, true).await? {
            return Err(ActionError::Conflict(format!(
                "another action is already running for operation {}",
                process_id
            )));
        }
        debug!("Acquired lock of {}", process_id);
        Ok(())
    }

    /// Move the operation to `state` and drop its lock.
    ///
    /// `ended_at` is set when `state` is final. Staying in the current state
    /// only drops the lock.
    pub async fn release_lock(&self, process_id: &str, state: OperationState) -> Result<(), ActionError> {
        let operation = self.load(process_id).await?;

        if operation.state != state {
            if !operation.state.can_transition_to(state) {
                return Err(ActionError::InvalidTransition {
                    from: operation.state,
                    to: state,
                });
            }
            let ended_at = state.is_final().then(Utc::now);
            let moved = self
                .operations
                .transition_state(process_id, &[operation.state], state, ended_at)
                .await?;
            if !moved {
                return Err(ActionError::Conflict(format!(
                    "state of operation {} changed concurrently",
                    process_id
                )));
            }
        }

        self.operations.compare_and_set_lock(process_id, true, false).await?;
        debug!("Released lock of {} in state {}", process_id, state);
        Ok(())
    }

    /// Drop the lock if held. Missing rows and store errors are logged only.
    pub async fn attempt_to_release_lock(&self, process_id: &str) {
        match self.operations.compare_and_set_lock(process_id, true, false).await {
            Ok(true) => debug!("Released lock of {}", process_id),
            Ok(false) => {}
            Err(e) => warn!("Failed to release lock of {}: {}", process_id, e),
        }
    }
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
