//! Telemetry errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
