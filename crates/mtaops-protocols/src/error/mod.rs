//! Error types for the mtaops protocol layer.

mod action;
mod cleanup;
mod engine;
mod store;
mod telemetry;

pub use action::*;
pub use cleanup::*;
pub use engine::*;
pub use store::*;
pub use telemetry::*;
