//! Routing of incoming publishes to coordinator messages.

use coolhub_app::inbound::InboundMessage;
use coolhub_domain::button::ButtonPress;
use coolhub_domain::telemetry::RawTelemetry;

use crate::config::TopicConfig;
use crate::error::MqttError;

impl TopicConfig {
    /// Topics to (re)subscribe to after every ConnAck.
    #[must_use]
    pub fn subscriptions(&self) -> [&str; 2] {
        [self.telemetry.as_str(), self.button.as_str()]
    }

    /// Turn an incoming publish into an [`InboundMessage`].
    ///
    /// Telemetry is forwarded raw, validation belongs to the coordinator.
    /// Button payloads are parsed here.
    ///
    /// # Errors
    ///
    /// - [`MqttError::UnknownTopic`] for topics outside the subscriptions
    /// - [`MqttError::Button`] when a button payload cannot be parsed
    pub fn route(&self, topic: &str, payload: &[u8]) -> Result<InboundMessage, MqttError> {
        if topic == self.telemetry {
            Ok(InboundMessage::Telemetry(RawTelemetry::now(payload)))
        } else if topic == self.button {
            ButtonPress::parse(payload)
                .map(InboundMessage::Button)
                .map_err(MqttError::Button)
        } else {
            Err(MqttError::UnknownTopic(topic.to_string()))
        }
    }
}
