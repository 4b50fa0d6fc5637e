//! MQTT transport configuration.

use std::time::Duration;

use coolhub_app::backoff::Backoff;
use serde::Deserialize;

/// Topic names used by the control loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Sensor telemetry (subscribed).
    pub telemetry: String,
    /// Operator button (subscribed).
    pub button: String,
    /// Relay commands (published).
    pub relay: String,
    /// Operator alarms (published).
    pub alarm: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            telemetry: "sensors/dht".to_string(),
            button: "control/button".to_string(),
            relay: "control/relay".to_string(),
            alarm: "control/alarm".to_string(),
        }
    }
}

/// Configuration for the MQTT transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Capacity of the outgoing request queue.
    pub request_capacity: usize,
    /// First reconnect delay, in milliseconds.
    pub reconnect_min_ms: u64,
    /// Reconnect delay cap, in milliseconds.
    pub reconnect_max_ms: u64,
    pub topics: TopicConfig,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "coolhub".to_string(),
            keep_alive_secs: 60,
            request_capacity: 32,
            reconnect_min_ms: 1_000,
            reconnect_max_ms: 30_000,
            topics: TopicConfig::default(),
        }
    }
}

impl MqttConfig {
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_secs))
    }

    #[must_use]
    pub fn reconnect_backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.reconnect_min_ms),
            Duration::from_millis(self.reconnect_max_ms),
        )
    }
}
