//! Telemetry decoder — turns raw sensor payloads into validated [`Reading`]s.
//!
//! Accepted payload (JSON):
//!
//! ```json
//! { "temperature": 23.4, "humidity": 41.0, "timestamp": "2024-05-01T12:00:00Z" }
//! ```
//!
//! `temp` / `hum` are accepted as aliases, `timestamp` may be naive ISO-8601
//! (read as UTC) or missing (reception time is used), and an optional
//! `source` names the emitting sensor.

use std::time::{Duration, Instant};

use chrono::TimeDelta;
use serde::Deserialize;

use crate::error::DecodeError;
use crate::reading::{Reading, SensorBounds};
use crate::time::Timestamp;

/// Source id used when the payload does not name its sensor.
pub const DEFAULT_SOURCE: &str = "sensors/dht";

/// A sensor message as delivered by the transport, not yet validated.
#[derive(Debug, Clone)]
pub struct RawTelemetry {
    /// Message body.
    pub payload: Vec<u8>,
    /// Monotonic reception time.
    pub received_at: Instant,
    /// Wall-clock reception time.
    pub received_wall: Timestamp,
}

impl RawTelemetry {
    /// Wrap a payload received right now.
    #[must_use]
    pub fn now(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            received_at: Instant::now(),
            received_wall: crate::time::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelemetryPayload {
    #[serde(alias = "temp")]
    temperature: f64,
    #[serde(alias = "hum")]
    humidity: f64,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, alias = "sensor_id")]
    source: Option<String>,
}

/// Stateless validator for inbound telemetry.
///
/// The decoder itself keeps no memory of past readings: the caller passes
/// the timestamp of the last accepted reading so staleness can be judged.
#[derive(Debug, Clone)]
pub struct TelemetryDecoder {
    bounds: SensorBounds,
    stale_skew: TimeDelta,
}

impl TelemetryDecoder {
    /// Create a decoder with the default physical bounds.
    #[must_use]
    pub fn new(stale_skew: Duration) -> Self {
        Self::with_bounds(SensorBounds::default(), stale_skew)
    }

    /// Create a decoder with explicit bounds.
    #[must_use]
    pub fn with_bounds(bounds: SensorBounds, stale_skew: Duration) -> Self {
        Self {
            bounds,
            stale_skew: TimeDelta::from_std(stale_skew).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Decode and validate a raw payload.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::MalformedPayload`] when the body is not a telemetry
    ///   document or its timestamp cannot be parsed
    /// - [`DecodeError::OutOfRange`] when a value violates physical bounds
    /// - [`DecodeError::StaleTimestamp`] when the reading is older than
    ///   `last_accepted` by more than the configured skew
    pub fn decode(
        &self,
        raw: &RawTelemetry,
        last_accepted: Option<Timestamp>,
    ) -> Result<Reading, DecodeError> {
        let payload: TelemetryPayload = serde_json::from_slice(&raw.payload)
            .map_err(|err| DecodeError::MalformedPayload(err.to_string()))?;

        self.bounds.check(payload.temperature, payload.humidity)?;

        let observed_at = match payload.timestamp.as_deref() {
            Some(value) => crate::time::parse(value).ok_or_else(|| {
                DecodeError::MalformedPayload(format!("invalid timestamp {value:?}"))
            })?,
            None => raw.received_wall,
        };

        if let Some(last_accepted) = last_accepted {
            let is_stale = last_accepted
                .checked_sub_signed(self.stale_skew)
                .is_some_and(|oldest| observed_at < oldest);
            if is_stale {
                return Err(DecodeError::StaleTimestamp {
                    timestamp: observed_at,
                    last_accepted,
                });
            }
        }

        Ok(Reading {
            observed_at,
            received_at: raw.received_at,
            temperature: payload.temperature,
            humidity: payload.humidity,
            source_id: payload
                .source
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        })
    }
}
