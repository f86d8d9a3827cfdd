//! Historic operation events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle event recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Started,
    Resumed,
    Retried,
    /// Abort intent recorded in the operation store.
    Aborted,
    /// Engine-side teardown of the execution tree completed.
    AbortExecuted,
    Finished,
    FailedByContentError,
    FailedByInfrastructureError,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::Started,
        EventType::Resumed,
        EventType::Retried,
        EventType::Aborted,
        EventType::AbortExecuted,
        EventType::Finished,
        EventType::FailedByContentError,
        EventType::FailedByInfrastructureError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Started => "STARTED",
            EventType::Resumed => "RESUMED",
            EventType::Retried => "RETRIED",
            EventType::Aborted => "ABORTED",
            EventType::AbortExecuted => "ABORT_EXECUTED",
            EventType::Finished => "FINISHED",
            EventType::FailedByContentError => "FAILED_BY_CONTENT_ERROR",
            EventType::FailedByInfrastructureError => "FAILED_BY_INFRASTRUCTURE_ERROR",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {}", s))
    }
}

/// Append-only audit record. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricOperationEvent {
    pub process_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

impl HistoricOperationEvent {
    pub fn new(process_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            process_id: process_id.into(),
            event_type,
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_strings() {
        assert_eq!(EventType::AbortExecuted.to_string(), "ABORT_EXECUTED");
        assert_eq!("RETRIED".parse::<EventType>().unwrap(), EventType::Retried);
        assert!("PAUSED".parse::<EventType>().is_err());
    }

    #[test]
    fn test_event_serialization() {
        let event = HistoricOperationEvent::new("p1", EventType::Aborted);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["process_id"], "p1");
        assert_eq!(json["event_type"], "ABORTED");
    }
}
