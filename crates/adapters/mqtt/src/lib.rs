//! # coolhub-adapter-mqtt
//!
//! MQTT adapter — connects the control loop to the broker via `rumqttc`.
//!
//! ## Responsibilities
//! - Subscribe to the telemetry and button topics (re-subscribing on every
//!   ConnAck)
//! - Route incoming publishes into the coordinator queue as
//!   [`InboundMessage`](coolhub_app::inbound::InboundMessage)s
//! - Report link transitions and reconnect with capped exponential backoff
//! - Implement [`ControlPublisher`](coolhub_app::ports::ControlPublisher) for
//!   relay commands and alarms (QoS 1)
//!
//! ## Dependency rule
//! Same as other adapters: depends on `coolhub-app` and `coolhub-domain`.

pub mod config;
pub mod error;
mod publisher;
mod topics;
mod transport;

pub use config::{MqttConfig, TopicConfig};
pub use error::MqttError;
pub use publisher::MqttPublisher;
pub use transport::{MqttTransport, connect};
