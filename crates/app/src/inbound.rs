//! Messages the transport hands to the coordinator queue.

use coolhub_domain::button::ButtonPress;
use coolhub_domain::telemetry::RawTelemetry;

/// Connectivity change observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// The broker acknowledged a (re)connection.
    Connected,
    /// The connection dropped.
    Disconnected { reason: String },
}

/// Everything the coordinator reacts to.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Telemetry(RawTelemetry),
    Button(ButtonPress),
    Link(LinkStatus),
}

impl InboundMessage {
    /// Short label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Telemetry(_) => "telemetry",
            Self::Button(_) => "button",
            Self::Link(_) => "link",
        }
    }
}
