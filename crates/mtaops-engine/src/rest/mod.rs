//! REST binding for a Flowable-compatible engine.

mod api;
mod client;

pub use client::RestProcessEngine;
