//! Hysteresis policy — maps a reading to a desired fan state.
//!
//! Two thresholds form a band: the fan turns on at or above `t_high` and
//! only turns off again at or below `t_low`. Inside the band the previous
//! state is held, so sensor noise around a single threshold cannot make
//! the relay chatter.

use crate::error::ValidationError;
use crate::fan::FanState;
use crate::reading::Reading;

/// Threshold pair with `t_low < t_high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisPolicy {
    t_low: f64,
    t_high: f64,
}

impl HysteresisPolicy {
    /// Build a policy from a threshold pair.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NonFiniteThreshold`] if either bound is not
    /// finite and [`ValidationError::InvalidThresholds`] unless `t_low < t_high`.
    pub fn new(t_low: f64, t_high: f64) -> Result<Self, ValidationError> {
        for value in [t_low, t_high] {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteThreshold(value));
            }
        }
        if t_low >= t_high {
            return Err(ValidationError::InvalidThresholds {
                low: t_low,
                high: t_high,
            });
        }
        Ok(Self { t_low, t_high })
    }

    #[must_use]
    pub fn t_low(&self) -> f64 {
        self.t_low
    }

    #[must_use]
    pub fn t_high(&self) -> f64 {
        self.t_high
    }

    /// Decide the fan state for `reading`, given the state currently in force.
    ///
    /// Humidity is ignored.
    #[must_use]
    pub fn evaluate(&self, reading: &Reading, previous: FanState) -> FanState {
        self.evaluate_temperature(reading.temperature, previous)
    }

    /// Same as [`evaluate`](Self::evaluate) on a bare temperature.
    #[must_use]
    pub fn evaluate_temperature(&self, temperature: f64, previous: FanState) -> FanState {
        if temperature >= self.t_high {
            FanState::On
        } else if temperature <= self.t_low {
            FanState::Off
        } else {
            previous
        }
    }

    /// Human-readable explanation for a transition, used in alarms.
    #[must_use]
    pub fn describe(&self, temperature: f64, state: FanState) -> String {
        match state {
            FanState::On => format!("temperature {temperature}°C >= {}°C", self.t_high),
            FanState::Off => format!("temperature {temperature}°C <= {}°C", self.t_low),
        }
    }
}
