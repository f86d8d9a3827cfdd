//! # mtaops Engine
//!
//! Bindings of the [`ProcessEngine`](mtaops_protocols::engine::ProcessEngine)
//! adapter.
//!
//! - [`RestProcessEngine`]: client for a Flowable-compatible REST API
//! - [`InMemoryProcessEngine`]: process trees held in memory, for tests and
//!   dry runs
//!
//! Both delete execution trees through [`delete_with_retry`], which retries
//! optimistic-lock conflicts until the [`DeletionPolicy`] deadline passes.

mod deletion;
mod memory;
mod rest;

pub use deletion::{delete_with_retry, DeletionPolicy};
pub use memory::InMemoryProcessEngine;
pub use rest::RestProcessEngine;
