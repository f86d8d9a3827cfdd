//! The cleaner contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mtaops_protocols::error::CleanupError;

/// Priority of cleaners that end or reclaim operations themselves.
pub const PRIORITY_OPERATIONS: u32 = 10;
/// Priority of cleaners that reclaim per-operation artifacts.
pub const PRIORITY_ARTIFACTS: u32 = 20;
/// Priority of cleaners that talk to the workflow engine's history.
pub const PRIORITY_ENGINE: u32 = 30;
/// Priority of the final row reclamation.
pub const PRIORITY_RECLAIM: u32 = 40;

/// One step of the cleanup chain.
///
/// `execute` removes what is older than `expiration` and returns how many
/// items it affected. Failures of single items are handled inside the
/// cleaner; an `Err` means the whole step failed.
#[async_trait]
pub trait Cleaner: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> u32;

    async fn execute(&self, expiration: DateTime<Utc>) -> Result<usize, CleanupError>;
}
