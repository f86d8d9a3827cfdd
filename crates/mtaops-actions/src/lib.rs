//! # mtaops Actions
//!
//! User-facing actions on operations and the plumbing around them.
//!
//! ## Flow
//!
//! ```text
//! ActionDispatcher::execute("retry", user, pid)
//!   └── RetryAction
//!         ├── ConflictPreventer::acquire_lock
//!         ├── additional actions (ClearErrorMessages, SetRetryPhase)
//!         ├── ProcessEngine: dead-letter work -> executable, innermost first
//!         ├── RETRIED event, ERROR -> RUNNING
//!         └── lock released, whatever the outcome
//! ```
//!
//! ## Key Components
//!
//! - [`ActionDispatcher`]: explicit registry of [`ProcessAction`]s
//! - [`StartAction`], [`ResumeAction`], [`RetryAction`], [`AbortAction`]
//! - [`ConflictPreventer`]: per-operation lock on the operation row
//! - [`EngineSignalHandler`]: engine-reported wait points, completion and
//!   failure
//! - [`OperationLauncher`]: starts new operations
//! - [`WorkerPool`]: owned pool for best-effort background work

pub mod action;
pub mod additional;
pub mod conflict;
pub mod context;
pub mod dispatcher;
pub mod launcher;
pub mod process;
pub mod session;
pub mod signals;
pub mod telemetry;
pub mod workers;

pub use action::{ActionId, ProcessAction};
pub use additional::{default_additional_actions, AdditionalAction};
pub use conflict::ConflictPreventer;
pub use context::ActionContext;
pub use dispatcher::ActionDispatcher;
pub use launcher::OperationLauncher;
pub use process::{AbortAction, ResumeAction, RetryAction, StartAction, ABORT_REASON};
pub use session::MemoryClientSessionCache;
pub use signals::EngineSignalHandler;
pub use telemetry::{publish_in_background, TracingTelemetryPublisher};
pub use workers::WorkerPool;
