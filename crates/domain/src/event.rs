//! Control event — an immutable record of a state transition.
//!
//! Events are appended to the persistence sink in the order the coordinator
//! decides them. A command is never published before the event that
//! justifies it has been acknowledged by the sink.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::EventId;
use crate::time::Timestamp;

/// What kind of transition an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A sensor reading was accepted.
    ReadingReceived,
    /// The control mode switched, or the operator changed the manual state.
    ModeChanged,
    /// A command was published to the actuator.
    CommandIssued,
    /// The transport disconnected or reconnected.
    TransportFault,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::ReadingReceived,
        Self::ModeChanged,
        Self::CommandIssued,
        Self::TransportFault,
    ];

    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadingReceived => "READING_RECEIVED",
            Self::ModeChanged => "MODE_CHANGED",
            Self::CommandIssued => "COMMAND_ISSUED",
            Self::TransportFault => "TRANSPORT_FAULT",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown event kind.
#[derive(Debug, thiserror::Error)]
#[error("unknown event kind {0:?}")]
pub struct UnknownEventKind(String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// A persisted record of something the coordinator decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub id: EventId,
    pub kind: EventKind,
    pub timestamp: Timestamp,
    pub payload: serde_json::Value,
}

impl ControlEvent {
    /// Create a new event stamped with the given time.
    #[must_use]
    pub fn new(kind: EventKind, timestamp: Timestamp, payload: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            kind,
            timestamp,
            payload,
        }
    }
}

/// Closed time interval `[start, end]` for event queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    #[must_use]
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Whether `ts` lies within the range (both ends inclusive).
    #[must_use]
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts <= self.end
    }
}
