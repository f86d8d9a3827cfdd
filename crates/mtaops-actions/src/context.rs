//! Shared collaborators of the process actions.

use std::sync::Arc;

use mtaops_protocols::engine::ProcessEngine;
use mtaops_protocols::error::ActionError;
use mtaops_protocols::operation::Operation;
use mtaops_protocols::store::{HistoricEventStore, OperationStore, ProgressMessageStore};
use mtaops_protocols::telemetry::{ClientSessionCache, TelemetryPublisher};
use mtaops_store::StoreSet;

use crate::additional::{default_additional_actions, AdditionalAction};
use crate::conflict::ConflictPreventer;
use crate::session::MemoryClientSessionCache;
use crate::telemetry::TracingTelemetryPublisher;
use crate::workers::WorkerPool;

/// Everything an action needs, bound once at startup.
#[derive(Clone)]
pub struct ActionContext {
    pub operations: Arc<dyn OperationStore>,
    pub events: Arc<dyn HistoricEventStore>,
    pub progress_messages: Arc<dyn ProgressMessageStore>,
    pub engine: Arc<dyn ProcessEngine>,
    pub conflict: ConflictPreventer,
    pub sessions: Arc<dyn ClientSessionCache>,
    pub telemetry: Arc<dyn TelemetryPublisher>,
    pub workers: Arc<WorkerPool>,
    pub additional: Vec<Arc<dyn AdditionalAction>>,
}

impl ActionContext {
    /// Context with the default session cache, telemetry publisher and
    /// additional actions.
    pub fn new(stores: &StoreSet, engine: Arc<dyn ProcessEngine>, workers: Arc<WorkerPool>) -> Self {
        Self {
            operations: stores.operations.clone(),
            events: stores.events.clone(),
            progress_messages: stores.progress_messages.clone(),
            conflict: ConflictPreventer::new(stores.operations.clone()),
            sessions: Arc::new(MemoryClientSessionCache::new()),
            telemetry: Arc::new(TracingTelemetryPublisher),
            additional: default_additional_actions(stores.progress_messages.clone(), engine.clone()),
            engine,
            workers,
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn ClientSessionCache>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryPublisher>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_additional_actions(mut self, additional: Vec<Arc<dyn AdditionalAction>>) -> Self {
        self.additional = additional;
        self
    }

    pub(crate) async fn load_operation(&self, process_id: &str) -> Result<Operation, ActionError> {
        self.operations
            .get(process_id)
            .await?
            .ok_or_else(|| ActionError::OperationNotFound(process_id.to_string()))
    }
}
