//! MQTT adapter error types.

use coolhub_domain::button::ButtonParseError;
use coolhub_domain::error::CoolHubError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// No broker connection is currently acknowledged.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// Failed to encode an outgoing MQTT payload as JSON.
    #[error("failed to encode MQTT payload")]
    PayloadEncode(#[source] serde_json::Error),

    /// A button message could not be understood.
    #[error("failed to parse button payload")]
    Button(#[source] ButtonParseError),

    /// A message arrived on a topic nobody listens to.
    #[error("unhandled topic {0:?}")]
    UnknownTopic(String),
}

impl MqttError {
    /// Convert into a [`CoolHubError::Transport`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> CoolHubError {
        CoolHubError::Transport(Box::new(self))
    }
}

impl From<MqttError> for CoolHubError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_connected_error() {
        let err = MqttError::NotConnected;
        assert_eq!(err.to_string(), "MQTT client not connected");
    }

    #[test]
    fn should_convert_not_connected_to_transport_error() {
        let err: CoolHubError = MqttError::NotConnected.into();
        assert!(matches!(err, CoolHubError::Transport(_)));
    }

    #[test]
    fn should_display_payload_encode_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{bad").unwrap_err();
        let err = MqttError::PayloadEncode(json_err);
        assert_eq!(err.to_string(), "failed to encode MQTT payload");
    }

    #[test]
    fn should_name_unknown_topic() {
        let err = MqttError::UnknownTopic("foo/bar".into());
        assert_eq!(err.to_string(), "unhandled topic \"foo/bar\"");
    }
}
