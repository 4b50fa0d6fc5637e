//! Alarm — an operator-facing notification published alongside commands.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Severity of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmLevel {
    Info,
    Warning,
    Critical,
}

/// A human-readable notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    pub timestamp: Timestamp,
    pub level: AlarmLevel,
    pub message: String,
}

/// Wire payload published on the alarm topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPayload {
    pub timestamp: String,
    pub message: String,
    pub level: AlarmLevel,
}

impl Alarm {
    #[must_use]
    pub fn new(timestamp: Timestamp, level: AlarmLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            level,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn to_payload(&self) -> AlarmPayload {
        AlarmPayload {
            timestamp: crate::time::format(self.timestamp),
            message: self.message.clone(),
            level: self.level,
        }
    }
}
