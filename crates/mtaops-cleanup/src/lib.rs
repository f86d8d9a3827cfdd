//! # mtaops Cleanup
//!
//! Retention-driven reclamation of operations, their artifacts and the
//! workflow engine's history.
//!
//! ## Chain
//!
//! | Priority | Cleaners |
//! |----------|----------|
//! | 10 | active operations (or the paginated operations sweep), tokens |
//! | 20 | inactive operations, files, process logs, progress messages, step analytics, historic events |
//! | 30 | engine history, aborted-operation reaper |
//! | 40 | expired operation rows |
//!
//! The [`CleanupCoordinator`] runs them in that order and isolates every
//! failure; [`CleanupScheduler`] fires the coordinator on a cron schedule.

pub mod artifacts;
pub mod cleaner;
pub mod coordinator;
pub mod engine_data;
pub mod operations;
pub mod registry;
pub mod scheduler;

pub use artifacts::{
    FilesCleaner, HistoricOperationEventsCleaner, ProcessLogsCleaner, ProgressMessagesCleaner,
    StepAnalyticsCleaner, TokenCleaner,
};
pub use cleaner::Cleaner;
pub use coordinator::{CleanerOutcome, CleanerReport, CleanupCoordinator, CleanupReport};
pub use engine_data::{AbortedOperationsCleaner, HistoricEngineDataCleaner};
pub use operations::{
    ActiveOperationsCleaner, ExpiredOperationsCleaner, InactiveOperationsCleaner, OperationsCleaner,
};
pub use registry::{build_cleaners, build_coordinator};
pub use scheduler::CleanupScheduler;
