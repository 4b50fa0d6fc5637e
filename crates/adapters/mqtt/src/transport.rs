//! MQTT event loop: forwards publishes to the coordinator queue and reports
//! link changes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use coolhub_app::backoff::Backoff;
use coolhub_app::inbound::{InboundMessage, LinkStatus};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;

use crate::config::{MqttConfig, TopicConfig};
use crate::publisher::MqttPublisher;

/// Remembers the last link status reported to the coordinator so each
/// transition is reported once.
#[derive(Debug)]
struct LinkTracker {
    connected: Arc<AtomicBool>,
    reported: Option<bool>,
}

impl LinkTracker {
    fn new(connected: Arc<AtomicBool>) -> Self {
        Self {
            connected,
            reported: None,
        }
    }

    fn up(&mut self) -> Option<LinkStatus> {
        self.connected.store(true, Ordering::SeqCst);
        if self.reported == Some(true) {
            return None;
        }
        self.reported = Some(true);
        Some(LinkStatus::Connected)
    }

    fn down(&mut self, reason: impl Into<String>) -> Option<LinkStatus> {
        self.connected.store(false, Ordering::SeqCst);
        if self.reported == Some(false) {
            return None;
        }
        self.reported = Some(false);
        Some(LinkStatus::Disconnected {
            reason: reason.into(),
        })
    }
}

/// Drives the rumqttc [`EventLoop`].
pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    topics: TopicConfig,
    backoff: Backoff,
    link: LinkTracker,
}

/// Build the transport and its matching publisher.
///
/// Nothing touches the network until [`MqttTransport::run`] polls.
#[must_use]
pub fn connect(config: &MqttConfig) -> (MqttPublisher, MqttTransport) {
    let mut options = MqttOptions::new(
        config.client_id.clone(),
        config.broker_host.clone(),
        config.broker_port,
    );
    options.set_keep_alive(config.keep_alive());

    let (client, eventloop) = AsyncClient::new(options, config.request_capacity);
    let connected = Arc::new(AtomicBool::new(false));

    let publisher = MqttPublisher::new(
        client.clone(),
        config.topics.relay.clone(),
        config.topics.alarm.clone(),
        Arc::clone(&connected),
    );
    let transport = MqttTransport {
        client,
        eventloop,
        topics: config.topics.clone(),
        backoff: config.reconnect_backoff(),
        link: LinkTracker::new(connected),
    };
    (publisher, transport)
}

impl MqttTransport {
    /// Poll the broker until `shutdown` resolves or the coordinator goes away.
    ///
    /// Subscriptions are re-issued on every ConnAck. Connection errors are
    /// reported once per outage and retried with capped exponential backoff.
    pub async fn run<F>(mut self, inbox: mpsc::Sender<InboundMessage>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(telemetry = %self.topics.telemetry, button = %self.topics.button, "mqtt transport started");

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::info!("mqtt transport shutting down");
                    break;
                }
                event = self.eventloop.poll() => {
                    let message = match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            match self.topics.route(&publish.topic, &publish.payload) {
                                Ok(message) => Some(message),
                                Err(err) => {
                                    tracing::warn!(topic = %publish.topic, error = %err, "dropping mqtt message");
                                    None
                                }
                            }
                        }
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            if ack.code == ConnectReturnCode::Success {
                                self.on_connected().await
                            } else {
                                tracing::error!(code = ?ack.code, "broker refused connection");
                                self.link.down(format!("connection refused: {:?}", ack.code))
                                    .map(InboundMessage::Link)
                            }
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            tracing::warn!("broker closed the connection");
                            self.link.down("broker sent disconnect").map(InboundMessage::Link)
                        }
                        Ok(_) => None,
                        Err(err) => {
                            let delay = self.backoff.next_delay();
                            tracing::error!(error = %err, retry_in = ?delay, "mqtt connection error");
                            let status = self.link.down(err.to_string());
                            if let Some(status) = status
                                && inbox.send(InboundMessage::Link(status)).await.is_err()
                            {
                                break;
                            }
                            tokio::select! {
                                biased;
                                () = &mut shutdown => {
                                    tracing::info!("mqtt transport shutting down during backoff");
                                    break;
                                }
                                () = tokio::time::sleep(delay) => None,
                            }
                        }
                    };

                    if let Some(message) = message
                        && inbox.send(message).await.is_err()
                    {
                        tracing::warn!("coordinator queue closed, stopping mqtt transport");
                        break;
                    }
                }
            }
        }

        if let Err(err) = self.client.try_disconnect() {
            tracing::debug!(error = %err, "mqtt disconnect request failed");
        }
    }

    async fn on_connected(&mut self) -> Option<InboundMessage> {
        tracing::info!("mqtt connected");
        self.backoff.reset();
        for topic in self.topics.subscriptions() {
            if let Err(err) = self.client.subscribe(topic, QoS::AtLeastOnce).await {
                tracing::error!(topic, error = %err, "subscribe failed");
            }
        }
        self.link.up().map(InboundMessage::Link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_report_each_transition_once() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut link = LinkTracker::new(Arc::clone(&flag));

        assert_eq!(link.up(), Some(LinkStatus::Connected));
        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(link.up(), None);

        assert!(matches!(
            link.down("reset"),
            Some(LinkStatus::Disconnected { reason }) if reason == "reset"
        ));
        assert!(!flag.load(Ordering::SeqCst));
        assert_eq!(link.down("again"), None);
    }

    #[test]
    fn should_report_initial_failure() {
        let mut link = LinkTracker::new(Arc::new(AtomicBool::new(false)));
        assert!(matches!(
            link.down("connection refused"),
            Some(LinkStatus::Disconnected { .. })
        ));
    }

    #[tokio::test]
    async fn should_stop_on_shutdown() {
        let config = MqttConfig {
            broker_port: 1,
            ..MqttConfig::default()
        };
        let (publisher, transport) = connect(&config);
        let (tx, mut rx) = mpsc::channel(4);

        transport.run(tx, std::future::ready(())).await;

        assert!(!publisher.is_connected());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn should_stop_on_shutdown_while_backing_off() {
        let config = MqttConfig {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1,
            reconnect_min_ms: 60_000,
            reconnect_max_ms: 60_000,
            ..MqttConfig::default()
        };
        let (_publisher, transport) = connect(&config);
        let (tx, mut rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        // the outage is reported right before the backoff sleep starts
        let stop_after_outage = async {
            let status = rx.recv().await;
            let _ = stop_tx.send(());
            status
        };
        let stopped = async {
            let _ = stop_rx.await;
        };
        let ((), status) = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            tokio::join!(transport.run(tx, stopped), stop_after_outage)
        })
        .await
        .expect("transport should stop without waiting for the backoff");

        assert!(matches!(
            status,
            Some(InboundMessage::Link(LinkStatus::Disconnected { .. }))
        ));
    }
}
