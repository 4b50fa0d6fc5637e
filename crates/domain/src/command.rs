//! Command — the only artifact ever published to the actuator topic.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fan::{ControlMode, FanState};
use crate::time::Timestamp;

/// Why a command was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandReason {
    /// The hysteresis policy crossed a threshold.
    Threshold,
    /// An operator override requested the state.
    Override,
    /// The operator released the override and the policy was re-evaluated.
    Release,
    /// The override timed out and the policy was re-evaluated.
    OverrideExpired,
    /// Recomputed after the transport came back.
    Resync,
    /// Forced safe default while persistence is unavailable.
    FailSafe,
}

impl CommandReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Override => "override",
            Self::Release => "release",
            Self::OverrideExpired => "override_expired",
            Self::Resync => "resync",
            Self::FailSafe => "fail_safe",
        }
    }
}

impl fmt::Display for CommandReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A desired fan state together with who asked for it and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub state: FanState,
    pub mode: ControlMode,
    pub timestamp: Timestamp,
    pub reason: CommandReason,
}

/// Wire payload published on the relay topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub state: FanState,
    pub mode: ControlMode,
    pub timestamp: String,
}

impl Command {
    /// Build the relay topic payload.
    #[must_use]
    pub fn to_relay_payload(&self) -> RelayPayload {
        RelayPayload {
            state: self.state,
            mode: self.mode,
            timestamp: crate::time::format(self.timestamp),
        }
    }

    /// JSON payload stored with `COMMAND_ISSUED` events.
    #[must_use]
    pub fn to_event_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.state,
            "mode": self.mode,
            "reason": self.reason,
            "timestamp": crate::time::format(self.timestamp),
        })
    }
}
