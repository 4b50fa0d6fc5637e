//! Read-only view of the coordinator, published through a `watch` channel.

use coolhub_domain::fan::{ControlMode, FanState};

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlStats {
    pub readings_accepted: u64,
    pub readings_rejected: u64,
    pub button_presses: u64,
    pub commands_published: u64,
    pub commands_queued: u64,
    pub alarms_raised: u64,
    pub persistence_failures: u64,
}

/// Point-in-time snapshot of the control state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub mode: ControlMode,
    /// Last state handed to the actuator.
    pub fan: FanState,
    pub connected: bool,
    pub fail_safe: bool,
    pub latest_temperature: Option<f64>,
    pub latest_humidity: Option<f64>,
    pub stats: ControlStats,
}
