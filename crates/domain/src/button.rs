//! Button actions — operator requests arriving on the button topic.

use serde::{Deserialize, Serialize};

use crate::fan::FanState;
use crate::time::Timestamp;

/// What the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ButtonAction {
    /// Force the fan on and take manual control.
    OverrideOn,
    /// Force the fan off and take manual control.
    OverrideOff,
    /// Flip the currently authoritative state and take manual control.
    Toggle,
    /// Hand control back to the threshold policy.
    Release,
}

impl ButtonAction {
    /// The fan state this action asks for, given the current authoritative one.
    ///
    /// Returns `None` for [`Release`](Self::Release).
    #[must_use]
    pub fn requested_state(self, current: FanState) -> Option<FanState> {
        match self {
            Self::OverrideOn => Some(FanState::On),
            Self::OverrideOff => Some(FanState::Off),
            Self::Toggle => Some(current.toggled()),
            Self::Release => None,
        }
    }

    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OverrideOn => "OVERRIDE_ON",
            Self::OverrideOff => "OVERRIDE_OFF",
            Self::Toggle => "TOGGLE",
            Self::Release => "RELEASE",
        }
    }
}

/// A button message after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPress {
    pub action: ButtonAction,
    /// Time the operator pressed, when the panel reported it.
    pub pressed_at: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
struct ButtonPayload {
    action: ButtonAction,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Why a button payload could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid button payload: {0}")]
pub struct ButtonParseError(String);

impl ButtonPress {
    /// Parse a button message.
    ///
    /// Accepts the JSON form `{"action": "OVERRIDE_ON", "timestamp": "…"}` and
    /// the plain-text `pressed` sent by simple push-button panels, which is
    /// read as [`ButtonAction::Toggle`].
    ///
    /// # Errors
    ///
    /// Returns [`ButtonParseError`] for anything else.
    pub fn parse(payload: &[u8]) -> Result<Self, ButtonParseError> {
        let text = std::str::from_utf8(payload)
            .map_err(|err| ButtonParseError(err.to_string()))?
            .trim();

        if text.eq_ignore_ascii_case("pressed") {
            return Ok(Self {
                action: ButtonAction::Toggle,
                pressed_at: None,
            });
        }

        let parsed: ButtonPayload =
            serde_json::from_str(text).map_err(|err| ButtonParseError(err.to_string()))?;
        let pressed_at = match parsed.timestamp.as_deref() {
            Some(value) => Some(
                crate::time::parse(value)
                    .ok_or_else(|| ButtonParseError(format!("invalid timestamp {value:?}")))?,
            ),
            None => None,
        };

        Ok(Self {
            action: parsed.action,
            pressed_at,
        })
    }
}
