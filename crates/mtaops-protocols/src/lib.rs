//! # mtaops Protocols
//!
//! Data model and protocol definitions for the mtaops operation controller.
//! Contains only types and interface definitions - no implementations.
//!
//! ## Core Traits
//!
//! - [`OperationStore`] - Persisted operation records and their queries
//! - [`HistoricEventStore`] - Append-only audit trail of lifecycle events
//! - [`ProcessEngine`] - Narrow adapter onto the external workflow engine
//! - [`TelemetryPublisher`] - Best-effort operation summaries
//! - [`ClientSessionCache`] - Per-user cached remote sessions

pub mod artifact;
pub mod engine;
pub mod error;
pub mod event;
pub mod operation;
pub mod store;
pub mod telemetry;

pub use artifact::{AccessToken, MessageType, ProcessLogEntry, ProgressMessage, StepAnalytics, StoredFile};
pub use engine::{ProcessDescription, ProcessEngine, Variables};
pub use error::{ActionError, CleanupError, EngineError, StoreError, TelemetryError};
pub use event::{EventType, HistoricOperationEvent};
pub use operation::{Operation, OperationFilter, OperationOrder, OperationState, ProcessType};
pub use store::{
    AnalyticsStore, FileStore, HistoricEventStore, OperationStore, ProcessLogStore,
    ProgressMessageStore, TokenStore,
};
pub use telemetry::{ClientSessionCache, OperationSummary, TelemetryPublisher};
