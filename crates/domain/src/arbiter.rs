//! Override arbiter — decides which command source is authoritative.
//!
//! The arbiter is a two-state machine over [`ControlMode`]:
//!
//! ```text
//!             override request
//!  AUTOMATIC ──────────────────▶ MANUAL ──┐ override request
//!      ▲                           │  ◀───┘ (adjust / refresh timer)
//!      └───── release | ttl ───────┘
//! ```
//!
//! It remembers the last request from each source: the operator's manual
//! state and the policy's latest recommendation. Time is passed in
//! explicitly so the machine stays pure.

use std::time::{Duration, Instant};

use crate::button::ButtonAction;
use crate::fan::{ControlMode, FanState};

/// An active manual override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualOverride {
    /// State requested by the operator.
    pub state: FanState,
    /// Last button activity; the TTL counts from here.
    pub last_activity: Instant,
}

/// Outcome of feeding a button action to the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterDecision {
    /// The action has no effect in the current mode.
    Ignored,
    /// AUTOMATIC → MANUAL with the requested state.
    Engaged { state: FanState },
    /// Still MANUAL, requested state changed.
    Adjusted { from: FanState, to: FanState },
    /// Still MANUAL, same state; only the timer was reset.
    Refreshed { state: FanState },
    /// MANUAL → AUTOMATIC on operator request.
    Released { manual_state: FanState },
}

/// Arbitrates between threshold control and operator overrides.
#[derive(Debug, Clone)]
pub struct OverrideArbiter {
    ttl: Duration,
    mode: ControlMode,
    manual: Option<ManualOverride>,
    automatic: FanState,
}

impl OverrideArbiter {
    /// Start in AUTOMATIC mode with `initial` as the policy's baseline.
    #[must_use]
    pub fn new(ttl: Duration, initial: FanState) -> Self {
        Self {
            ttl,
            mode: ControlMode::Automatic,
            manual: None,
            automatic: initial,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Last recommendation recorded from the policy.
    #[must_use]
    pub fn last_automatic(&self) -> FanState {
        self.automatic
    }

    /// The state the authoritative source currently asks for.
    #[must_use]
    pub fn authoritative(&self) -> FanState {
        match (self.mode, self.manual) {
            (ControlMode::Manual, Some(manual)) => manual.state,
            _ => self.automatic,
        }
    }

    /// When the active override lapses, if one is active.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.manual
            .map(|manual| manual.last_activity + self.ttl)
    }

    /// Apply an operator action.
    ///
    /// Button activity always counts, even if the TTL deadline has already
    /// passed: callers must not expire the override before applying a button
    /// message from the same cycle.
    pub fn on_button(&mut self, action: ButtonAction, now: Instant) -> ArbiterDecision {
        let Some(requested) = action.requested_state(self.authoritative()) else {
            return self.release();
        };

        if let Some(manual) = self.manual.as_mut() {
            let from = manual.state;
            manual.state = requested;
            manual.last_activity = now;
            return if from == requested {
                ArbiterDecision::Refreshed { state: requested }
            } else {
                ArbiterDecision::Adjusted {
                    from,
                    to: requested,
                }
            };
        }

        self.mode = ControlMode::Manual;
        self.manual = Some(ManualOverride {
            state: requested,
            last_activity: now,
        });
        ArbiterDecision::Engaged { state: requested }
    }

    fn release(&mut self) -> ArbiterDecision {
        match self.manual.take() {
            Some(manual) => {
                self.mode = ControlMode::Automatic;
                self.automatic = manual.state;
                ArbiterDecision::Released {
                    manual_state: manual.state,
                }
            }
            None => ArbiterDecision::Ignored,
        }
    }

    /// Revert to AUTOMATIC if the override TTL has elapsed at `now`.
    ///
    /// Returns the lapsed override. The policy baseline becomes the manual
    /// state, which is what the actuator is running.
    pub fn expire(&mut self, now: Instant) -> Option<ManualOverride> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        let manual = self.manual.take()?;
        self.mode = ControlMode::Automatic;
        self.automatic = manual.state;
        Some(manual)
    }

    /// Record a policy recommendation.
    ///
    /// Returns the state to act on when the policy is authoritative, or
    /// `None` while an override is active (the recommendation is kept but
    /// discarded for publication).
    pub fn offer_automatic(&mut self, state: FanState) -> Option<FanState> {
        self.automatic = state;
        match self.mode {
            ControlMode::Automatic => Some(state),
            ControlMode::Manual => None,
        }
    }
}
