//! Infrastructure configuration types (database, engine client, logging).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Operation store database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:` for an ephemeral database.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl DatabaseConfig {
    pub const IN_MEMORY: &'static str = ":memory:";

    pub fn is_in_memory(&self) -> bool {
        self.path == Self::IN_MEMORY
    }

    /// Path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

fn default_db_path() -> String {
    dirs::home_dir()
        .map(|h| h.join(".mtaops").join("mtaops.db").display().to_string())
        .unwrap_or_else(|| "mtaops.db".to_string())
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Workflow engine client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the engine REST API.
    #[serde(default = "default_engine_url")]
    pub base_url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Wait between execution-tree deletion attempts (milliseconds).
    #[serde(default = "default_attempt_wait_ms")]
    pub deletion_attempt_wait_ms: u64,

    /// Overall budget for deleting one execution tree (seconds).
    #[serde(default = "default_overall_wait_secs")]
    pub deletion_overall_wait_secs: u64,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Activity ids of the receive tasks where a process parks for Resume.
    #[serde(default = "default_wait_points")]
    pub wait_points: Vec<String>,
}

/// Wait points of the shipped deploy and undeploy process definitions.
pub const DEFAULT_WAIT_POINTS: &[&str] = &["waitForConfirmation", "waitForResume"];

fn default_engine_url() -> String {
    "http://localhost:8080/flowable-rest/service".to_string()
}

fn default_attempt_wait_ms() -> u64 {
    500
}

fn default_overall_wait_secs() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

fn default_wait_points() -> Vec<String> {
    DEFAULT_WAIT_POINTS.iter().map(|w| w.to_string()).collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_engine_url(),
            username: None,
            password: None,
            deletion_attempt_wait_ms: default_attempt_wait_ms(),
            deletion_overall_wait_secs: default_overall_wait_secs(),
            request_timeout_secs: default_request_timeout(),
            wait_points: default_wait_points(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rotated log files. Console only when unset.
    #[serde(default)]
    pub directory: Option<String>,

    /// Number of daily log files to keep.
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            max_files: default_max_log_files(),
        }
    }
}
