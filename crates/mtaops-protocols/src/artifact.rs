//! Per-operation artifacts reclaimed by cleanup: progress messages, process
//! logs, uploaded files, step analytics and cached access tokens.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Info,
    Warning,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Info => "INFO",
            MessageType::Warning => "WARNING",
            MessageType::Error => "ERROR",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(MessageType::Info),
            "WARNING" => Ok(MessageType::Warning),
            "ERROR" => Ok(MessageType::Error),
            other => Err(format!("unknown message type: {}", other)),
        }
    }
}

/// User-facing progress message emitted by a workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub id: String,
    pub process_id: String,
    pub step_id: String,
    pub message_type: MessageType,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressMessage {
    pub fn new(
        process_id: impl Into<String>,
        step_id: impl Into<String>,
        message_type: MessageType,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            process_id: process_id.into(),
            step_id: step_id.into(),
            message_type,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A process log file persisted for an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessLogEntry {
    pub process_id: String,
    pub space_id: String,
    pub name: String,
    pub content: String,
    pub modified_at: DateTime<Utc>,
}

impl ProcessLogEntry {
    pub fn new(
        process_id: impl Into<String>,
        space_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            space_id: space_id.into(),
            name: name.into(),
            content: content.into(),
            modified_at: Utc::now(),
        }
    }

    pub fn at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = modified_at;
        self
    }
}

/// Metadata of an uploaded file (archive or extension descriptor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: String,
    pub space_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn new(space_id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            space_id: space_id.into(),
            namespace: None,
            name: name.into(),
            size,
            modified_at: Utc::now(),
        }
    }

    pub fn at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = modified_at;
        self
    }
}

/// Timing sample for a single workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepAnalytics {
    pub process_id: String,
    pub step: String,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl StepAnalytics {
    pub fn new(process_id: impl Into<String>, step: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            process_id: process_id.into(),
            step: step.into(),
            duration_ms,
            recorded_at: Utc::now(),
        }
    }

    pub fn at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = recorded_at;
        self
    }
}

/// Cached platform access token for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub user: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(user: impl Into<String>, value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            user: user.into(),
            value: value.into(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_message_type_parse() {
        assert_eq!("ERROR".parse::<MessageType>().unwrap(), MessageType::Error);
        assert!("FATAL".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_progress_message_ids_are_unique() {
        let a = ProgressMessage::new("p1", "deploy-app", MessageType::Info, "a");
        let b = ProgressMessage::new("p1", "deploy-app", MessageType::Info, "b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        let token = AccessToken::new("alice", "t", now - Duration::seconds(1));
        assert!(token.is_expired(now));
        let fresh = AccessToken::new("alice", "t", now + Duration::hours(1));
        assert!(!fresh.is_expired(now));
    }
}
