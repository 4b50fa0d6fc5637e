//! [`ControlPublisher`] backed by a rumqttc [`AsyncClient`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use coolhub_app::ports::ControlPublisher;
use coolhub_domain::alarm::Alarm;
use coolhub_domain::command::Command;
use coolhub_domain::error::CoolHubError;
use rumqttc::{AsyncClient, QoS};
use serde::Serialize;

use crate::error::MqttError;

/// Publishes relay commands and alarms at QoS 1.
///
/// rumqttc buffers requests while offline, so the publisher checks the
/// connection flag maintained by the transport and refuses instead.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    relay_topic: String,
    alarm_topic: String,
    connected: Arc<AtomicBool>,
}

impl MqttPublisher {
    pub(crate) fn new(
        client: AsyncClient,
        relay_topic: String,
        alarm_topic: String,
        connected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            relay_topic,
            alarm_topic,
            connected,
        }
    }

    /// Whether the broker connection is currently acknowledged.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish_json<T: Serialize>(&self, topic: &str, value: &T) -> Result<(), MqttError> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }
        let payload = serde_json::to_vec(value).map_err(MqttError::PayloadEncode)?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(MqttError::Client)
    }
}

impl ControlPublisher for MqttPublisher {
    async fn publish_command(&self, command: &Command) -> Result<(), CoolHubError> {
        self.publish_json(&self.relay_topic, &command.to_relay_payload())
            .await?;
        tracing::debug!(topic = %self.relay_topic, state = %command.state, "relay command sent");
        Ok(())
    }

    async fn publish_alarm(&self, alarm: &Alarm) -> Result<(), CoolHubError> {
        self.publish_json(&self.alarm_topic, &alarm.to_payload())
            .await?;
        tracing::debug!(topic = %self.alarm_topic, level = ?alarm.level, "alarm sent");
        Ok(())
    }
}
