//! Fan state and control mode.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Desired or actual state of the cooling fan relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanState {
    On,
    #[default]
    Off,
}

impl FanState {
    /// The opposite state.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }

    /// Wire representation (`"ON"` / `"OFF"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for FanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which command source is currently authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlMode {
    /// Threshold policy drives the fan.
    #[default]
    Automatic,
    /// A human override drives the fan.
    Manual,
}

impl ControlMode {
    /// Wire representation (`"AUTOMATIC"` / `"MANUAL"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Automatic => "AUTOMATIC",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_off_and_automatic() {
        assert_eq!(FanState::default(), FanState::Off);
        assert_eq!(ControlMode::default(), ControlMode::Automatic);
    }

    #[test]
    fn should_toggle_fan_state() {
        assert_eq!(FanState::On.toggled(), FanState::Off);
        assert_eq!(FanState::Off.toggled(), FanState::On);
    }

    #[test]
    fn should_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&FanState::On).unwrap(), "\"ON\"");
        assert_eq!(
            serde_json::to_string(&ControlMode::Manual).unwrap(),
            "\"MANUAL\""
        );
    }

    #[test]
    fn should_display_wire_names() {
        assert_eq!(FanState::Off.to_string(), "OFF");
        assert_eq!(ControlMode::Automatic.to_string(), "AUTOMATIC");
    }
}
