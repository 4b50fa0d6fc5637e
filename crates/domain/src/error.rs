//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`CoolHubError`] at port boundaries.

use crate::time::Timestamp;

/// Workspace-wide error returned by ports and services.
#[derive(Debug, thiserror::Error)]
pub enum CoolHubError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// An inbound telemetry payload was rejected.
    #[error("decode error")]
    Decode(#[from] DecodeError),

    /// The persistence sink failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The publish/subscribe transport failed.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Invariant violations detected while building domain values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The hysteresis band is empty or inverted.
    #[error("t_low ({low}) must be strictly below t_high ({high})")]
    InvalidThresholds {
        /// Configured lower bound.
        low: f64,
        /// Configured upper bound.
        high: f64,
    },

    /// A threshold is NaN or infinite.
    #[error("threshold {0} is not a finite number")]
    NonFiniteThreshold(f64),

    /// A duration that must be positive was zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Why a sensor payload was rejected by the telemetry decoder.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not a well-formed telemetry document.
    #[error("malformed telemetry payload: {0}")]
    MalformedPayload(String),

    /// A measured quantity falls outside its physical bounds.
    #[error("{quantity} {value} outside of [{min}, {max}]")]
    OutOfRange {
        /// Which quantity was out of range (`temperature` or `humidity`).
        quantity: &'static str,
        /// The offending value.
        value: f64,
        /// Lower bound, inclusive.
        min: f64,
        /// Upper bound, inclusive.
        max: f64,
    },

    /// The reading is older than the last accepted one beyond the allowed skew.
    #[error("reading timestamp {timestamp} precedes last accepted {last_accepted} beyond allowed skew")]
    StaleTimestamp {
        /// Timestamp carried by the rejected reading.
        timestamp: Timestamp,
        /// Timestamp of the most recently accepted reading.
        last_accepted: Timestamp,
    },
}

impl DecodeError {
    /// Short machine-friendly label, used in logs and statistics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "malformed_payload",
            Self::OutOfRange { .. } => "out_of_range",
            Self::StaleTimestamp { .. } => "stale_timestamp",
        }
    }
}
