//! Reading — a validated temperature/humidity sample.

use std::ops::RangeInclusive;
use std::time::Instant;

use crate::error::DecodeError;
use crate::time::Timestamp;

/// Physical bounds a sample must respect to be accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorBounds {
    /// Accepted temperature range in °C.
    pub temperature: RangeInclusive<f64>,
    /// Accepted relative humidity range in %.
    pub humidity: RangeInclusive<f64>,
}

impl Default for SensorBounds {
    fn default() -> Self {
        Self {
            temperature: -40.0..=125.0,
            humidity: 0.0..=100.0,
        }
    }
}

impl SensorBounds {
    /// Reject values outside the configured ranges. Never clamps.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::OutOfRange`] for the first offending quantity.
    pub fn check(&self, temperature: f64, humidity: f64) -> Result<(), DecodeError> {
        check_quantity("temperature", temperature, &self.temperature)?;
        check_quantity("humidity", humidity, &self.humidity)
    }
}

fn check_quantity(
    quantity: &'static str,
    value: f64,
    range: &RangeInclusive<f64>,
) -> Result<(), DecodeError> {
    // NaN fails `contains`, so non-finite values are rejected here too.
    if range.contains(&value) {
        Ok(())
    } else {
        Err(DecodeError::OutOfRange {
            quantity,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// A single accepted sensor sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Wall-clock time the sample was taken (or received, if the sensor
    /// did not say).
    pub observed_at: Timestamp,
    /// Monotonic time the coordinator received the sample.
    pub received_at: Instant,
    /// Temperature in °C.
    pub temperature: f64,
    /// Relative humidity in %.
    pub humidity: f64,
    /// Which sensor produced the sample.
    pub source_id: String,
}

impl Reading {
    /// JSON payload stored with `READING_RECEIVED` events.
    #[must_use]
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "temperature": self.temperature,
            "humidity": self.humidity,
            "observed_at": crate::time::format(self.observed_at),
            "source_id": self.source_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_values_on_the_bounds() {
        let bounds = SensorBounds::default();
        assert!(bounds.check(-40.0, 0.0).is_ok());
        assert!(bounds.check(125.0, 100.0).is_ok());
    }

    #[test]
    fn should_reject_temperature_out_of_bounds() {
        let err = SensorBounds::default().check(130.0, 50.0).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::OutOfRange {
                quantity: "temperature",
                ..
            }
        ));
    }

    #[test]
    fn should_reject_negative_humidity() {
        let err = SensorBounds::default().check(20.0, -1.0).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::OutOfRange {
                quantity: "humidity",
                ..
            }
        ));
    }

    #[test]
    fn should_reject_nan() {
        assert!(SensorBounds::default().check(f64::NAN, 50.0).is_err());
    }

    #[test]
    fn should_build_event_payload() {
        let reading = Reading {
            observed_at: crate::time::parse("2024-05-01T12:00:00Z").unwrap(),
            received_at: Instant::now(),
            temperature: 23.5,
            humidity: 41.0,
            source_id: "sensors/dht".into(),
        };
        let payload = reading.to_payload();
        assert_eq!(payload["temperature"], 23.5);
        assert_eq!(payload["humidity"], 41.0);
        assert_eq!(payload["observed_at"], "2024-05-01T12:00:00.000000Z");
        assert_eq!(payload["source_id"], "sensors/dht");
    }
}
