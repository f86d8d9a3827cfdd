//! Bounded retry for execution-tree deletion.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use mtaops_config::EngineConfig;
use mtaops_protocols::error::EngineError;

/// Timing budget for deleting one execution tree.
///
/// The overall deadline is `attempt_wait + overall_wait`, measured from the
/// first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionPolicy {
    pub attempt_wait: Duration,
    pub overall_wait: Duration,
}

impl DeletionPolicy {
    pub fn new(attempt_wait: Duration, overall_wait: Duration) -> Self {
        Self {
            attempt_wait,
            overall_wait,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Duration::from_millis(config.deletion_attempt_wait_ms),
            Duration::from_secs(config.deletion_overall_wait_secs),
        )
    }

    pub fn deadline(&self) -> Duration {
        self.attempt_wait + self.overall_wait
    }
}

impl Default for DeletionPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Run `attempt` until it succeeds, retrying only optimistic-lock conflicts.
///
/// Non-retryable errors are returned immediately. When the next retry would
/// start past the deadline, fails with [`EngineError::DeadlineExceeded`].
pub async fn delete_with_retry<F, Fut>(
    process_id: &str,
    policy: &DeletionPolicy,
    mut attempt: F,
) -> Result<(), EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), EngineError>>,
{
    let started = Instant::now();
    let deadline = started + policy.deadline();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match attempt().await {
            Ok(()) => {
                if attempts > 1 {
                    debug!("Deleted execution tree of {} after {} attempts", process_id, attempts);
                }
                return Ok(());
            }
            Err(e) if e.is_retryable() => {
                let now = Instant::now();
                if now + policy.attempt_wait > deadline {
                    let waited_ms = now.duration_since(started).as_millis() as u64;
                    warn!(
                        "Giving up deleting execution tree of {} after {} attempts ({}ms): {}",
                        process_id, attempts, waited_ms, e
                    );
                    return Err(EngineError::DeadlineExceeded {
                        process_id: process_id.to_string(),
                        waited_ms,
                    });
                }
                debug!("Deletion of {} conflicted, retrying: {}", process_id, e);
                tokio::time::sleep(policy.attempt_wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}
