//! Control coordinator — the single owner of control mode and actuator state.
//!
//! Every inbound message (telemetry, button press, link change) is handled
//! here, one at a time. The coordinator:
//!
//! 1. validates telemetry and records it in the [`ControlLog`],
//! 2. feeds readings to the [`HysteresisPolicy`] and button presses to the
//!    [`OverrideArbiter`],
//! 3. persists the justifying event **before** publishing any command
//!    (write-ahead), then records the `COMMAND_ISSUED` event,
//! 4. queues commands while the link is down and recomputes them on
//!    reconnect instead of replaying,
//! 5. forces the fan ON when the control log stays unavailable (fail-safe).

mod config;
mod runtime;
mod status;

pub use config::CoordinatorConfig;
pub use status::{ControlStats, StatusSnapshot};

use std::time::Instant;

use coolhub_domain::alarm::{Alarm, AlarmLevel};
use coolhub_domain::arbiter::{ArbiterDecision, OverrideArbiter};
use coolhub_domain::button::ButtonPress;
use coolhub_domain::command::{Command, CommandReason};
use coolhub_domain::error::CoolHubError;
use coolhub_domain::event::{ControlEvent, EventKind};
use coolhub_domain::fan::{ControlMode, FanState};
use coolhub_domain::policy::HysteresisPolicy;
use coolhub_domain::reading::Reading;
use coolhub_domain::telemetry::{RawTelemetry, TelemetryDecoder};
use coolhub_domain::time::Timestamp;

use crate::backoff::RetryPolicy;
use crate::inbound::{InboundMessage, LinkStatus};
use crate::ports::{ControlLog, ControlPublisher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    /// No connection acknowledged yet.
    Unknown,
    Up,
    Down,
}

/// Monotonic time as seen by the tokio clock, so paused-clock tests drive
/// the override timer.
fn monotonic_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Serialized owner of the control state.
pub struct ControlCoordinator<L, P> {
    log: L,
    publisher: P,
    policy: HysteresisPolicy,
    decoder: TelemetryDecoder,
    arbiter: OverrideArbiter,
    retry: RetryPolicy,
    latest: Option<Reading>,
    /// Last state handed to the actuator.
    issued: FanState,
    /// Command computed while the link was down.
    pending: Option<Command>,
    link: Link,
    fail_safe: bool,
    /// Set when the log comes back after a fail-safe period.
    recovered: bool,
    last_event_at: Option<Timestamp>,
    stats: ControlStats,
}

impl<L, P> ControlCoordinator<L, P>
where
    L: ControlLog,
    P: ControlPublisher,
{
    /// Create a coordinator in AUTOMATIC mode with the fan assumed OFF.
    pub fn new(config: CoordinatorConfig, log: L, publisher: P) -> Self {
        Self {
            log,
            publisher,
            policy: config.policy,
            decoder: TelemetryDecoder::new(config.stale_timestamp_skew),
            arbiter: OverrideArbiter::new(config.override_ttl, FanState::Off),
            retry: config.persist_retry,
            latest: None,
            issued: FanState::Off,
            pending: None,
            link: Link::Unknown,
            fail_safe: false,
            recovered: false,
            last_event_at: None,
            stats: ControlStats::default(),
        }
    }

    /// Restore the last issued fan state from the control log.
    ///
    /// Returns the restored state, or `None` when nothing was ever issued.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the log cannot be read.
    pub async fn restore(&mut self) -> Result<Option<FanState>, CoolHubError> {
        if let Some(last) = self.log.recent(1).await?.into_iter().next() {
            self.last_event_at = Some(last.timestamp);
        }
        let Some(event) = self.log.last_of_kind(EventKind::CommandIssued).await? else {
            return Ok(None);
        };
        let state = event
            .payload
            .get("state")
            .cloned()
            .and_then(|value| serde_json::from_value::<FanState>(value).ok());
        let Some(state) = state else {
            tracing::warn!(event_id = %event.id, "last issued command has no readable state");
            return Ok(None);
        };
        self.issued = state;
        self.arbiter = OverrideArbiter::new(self.arbiter.ttl(), state);
        tracing::info!(%state, issued_at = %event.timestamp, "restored last issued fan state");
        Ok(Some(state))
    }

    #[must_use]
    pub fn mode(&self) -> ControlMode {
        self.arbiter.mode()
    }

    /// Last state handed to the actuator.
    #[must_use]
    pub fn fan_state(&self) -> FanState {
        self.issued
    }

    #[must_use]
    pub fn pending_command(&self) -> Option<&Command> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn is_fail_safe(&self) -> bool {
        self.fail_safe
    }

    #[must_use]
    pub fn stats(&self) -> ControlStats {
        self.stats
    }

    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            mode: self.arbiter.mode(),
            fan: self.issued,
            connected: self.link == Link::Up,
            fail_safe: self.fail_safe,
            latest_temperature: self.latest.as_ref().map(|r| r.temperature),
            latest_humidity: self.latest.as_ref().map(|r| r.humidity),
            stats: self.stats,
        }
    }

    /// Process one inbound message to completion.
    pub async fn handle(&mut self, message: InboundMessage) {
        tracing::trace!(kind = message.label(), "handling inbound message");
        match message {
            InboundMessage::Telemetry(raw) => self.on_telemetry(&raw).await,
            InboundMessage::Button(press) => self.on_button(&press).await,
            InboundMessage::Link(status) => self.on_link(status).await,
        }
        if std::mem::take(&mut self.recovered) {
            self.resync(CommandReason::Resync, "control resumed after fail-safe")
                .await;
        }
    }

    /// Return to AUTOMATIC if the override lapsed at `now`.
    ///
    /// Returns `true` when an override expired. The override stays active
    /// if the mode change cannot be logged.
    pub async fn poll_override_expiry(&mut self, now: Instant) -> bool {
        let mut next = self.arbiter.clone();
        let Some(lapsed) = next.expire(now) else {
            return false;
        };
        tracing::info!(manual_state = %lapsed.state, "manual override expired");
        if !self.return_to_automatic(next, "timeout", lapsed.state).await {
            return false;
        }
        self.alarm(
            AlarmLevel::Info,
            "Manual override expired - automatic control resumed",
        )
        .await;
        self.resync(CommandReason::OverrideExpired, "automatic control resumed")
            .await;
        true
    }

    async fn on_telemetry(&mut self, raw: &RawTelemetry) {
        // a lapsed override must not swallow this reading
        self.poll_override_expiry(monotonic_now()).await;

        let last_accepted = self.latest.as_ref().map(|r| r.observed_at);
        let reading = match self.decoder.decode(raw, last_accepted) {
            Ok(reading) => reading,
            Err(err) => {
                self.stats.readings_rejected += 1;
                tracing::warn!(kind = err.kind(), error = %err, "dropping telemetry");
                return;
            }
        };

        if self
            .persist(EventKind::ReadingReceived, reading.to_payload())
            .await
            .is_err()
        {
            return;
        }
        self.stats.readings_accepted += 1;
        tracing::debug!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            source = %reading.source_id,
            queued_for = ?reading.received_at.elapsed(),
            "reading accepted"
        );

        let recommended = self
            .policy
            .evaluate(&reading, self.arbiter.last_automatic());
        let temperature = reading.temperature;
        self.latest = Some(reading);

        match self.arbiter.offer_automatic(recommended) {
            Some(state) => {
                let detail = self.policy.describe(temperature, state);
                self.dispatch(state, CommandReason::Threshold, &detail).await;
            }
            None => {
                tracing::debug!(%recommended, temperature, "manual override active, recommendation discarded");
            }
        }
    }

    async fn on_button(&mut self, press: &ButtonPress) {
        self.stats.button_presses += 1;
        let action = press.action;
        // decided on a copy, adopted once the log has the transition
        let mut next = self.arbiter.clone();
        match next.on_button(action, monotonic_now()) {
            ArbiterDecision::Ignored => {
                tracing::debug!(action = action.as_str(), "button ignored in automatic mode");
            }
            ArbiterDecision::Engaged { state } => {
                let payload = serde_json::json!({
                    "from": ControlMode::Automatic,
                    "to": ControlMode::Manual,
                    "trigger": "button",
                    "action": action,
                    "requested_state": state,
                });
                if !self.commit_transition(next, payload).await {
                    return;
                }
                tracing::info!(%state, action = action.as_str(), "manual override engaged");
                let message = format!(
                    "Manual override: fan {state} for {}s",
                    self.arbiter.ttl().as_secs()
                );
                self.alarm(AlarmLevel::Warning, message).await;
                self.dispatch(state, CommandReason::Override, "manual override")
                    .await;
            }
            ArbiterDecision::Adjusted { from, to } => {
                let payload = serde_json::json!({
                    "from": ControlMode::Manual,
                    "to": ControlMode::Manual,
                    "trigger": "button",
                    "action": action,
                    "from_state": from,
                    "to_state": to,
                });
                if !self.commit_transition(next, payload).await {
                    return;
                }
                tracing::info!(%from, %to, "manual override adjusted");
                self.dispatch(to, CommandReason::Override, "manual override adjusted")
                    .await;
            }
            ArbiterDecision::Refreshed { state } => {
                self.arbiter = next;
                tracing::debug!(%state, "manual override refreshed");
                self.dispatch(state, CommandReason::Override, "manual override")
                    .await;
            }
            ArbiterDecision::Released { manual_state } => {
                if self.return_to_automatic(next, "release", manual_state).await {
                    self.resync(CommandReason::Release, "automatic control resumed")
                        .await;
                }
            }
        }
    }

    async fn on_link(&mut self, status: LinkStatus) {
        match status {
            LinkStatus::Disconnected { reason } => {
                if self.link == Link::Down {
                    tracing::debug!(%reason, "link already down");
                    return;
                }
                self.link = Link::Down;
                tracing::warn!(%reason, "transport disconnected");
                let payload = serde_json::json!({ "status": "disconnected", "reason": reason });
                let _ = self.persist(EventKind::TransportFault, payload).await;
            }
            LinkStatus::Connected => {
                let previous = std::mem::replace(&mut self.link, Link::Up);
                if previous == Link::Down {
                    tracing::info!("transport reconnected");
                    let payload = serde_json::json!({ "status": "reconnected" });
                    if self
                        .persist(EventKind::TransportFault, payload)
                        .await
                        .is_err()
                    {
                        return;
                    }
                    self.alarm(AlarmLevel::Warning, "Broker connection restored")
                        .await;
                } else {
                    tracing::info!("transport connected");
                }
                if let Some(discarded) = self.pending.take() {
                    tracing::info!(
                        state = %discarded.state,
                        reason = %discarded.reason,
                        "discarding queued command, recomputing"
                    );
                }
                self.resync(CommandReason::Resync, "resynchronised after reconnect")
                    .await;
            }
        }
    }

    async fn return_to_automatic(
        &mut self,
        next: OverrideArbiter,
        trigger: &'static str,
        manual_state: FanState,
    ) -> bool {
        let payload = serde_json::json!({
            "from": ControlMode::Manual,
            "to": ControlMode::Automatic,
            "trigger": trigger,
            "manual_state": manual_state,
        });
        if !self.commit_transition(next, payload).await {
            return false;
        }
        tracing::info!(trigger, "automatic control resumed");
        true
    }

    /// Log a `MODE_CHANGED` event, then adopt `next`.
    ///
    /// The current arbiter is kept when the append fails.
    async fn commit_transition(
        &mut self,
        next: OverrideArbiter,
        payload: serde_json::Value,
    ) -> bool {
        if self.persist(EventKind::ModeChanged, payload).await.is_err() {
            tracing::warn!(
                mode = %self.arbiter.mode(),
                "mode transition not logged, keeping current mode"
            );
            return false;
        }
        self.arbiter = next;
        true
    }

    /// State the actuator should be in right now.
    fn target_state(&self) -> FanState {
        match self.arbiter.mode() {
            ControlMode::Manual => self.arbiter.authoritative(),
            ControlMode::Automatic => match &self.latest {
                Some(reading) => self.policy.evaluate(reading, self.arbiter.last_automatic()),
                None => self.arbiter.last_automatic(),
            },
        }
    }

    async fn resync(&mut self, reason: CommandReason, detail: &str) {
        let state = self.target_state();
        if self.arbiter.mode() == ControlMode::Automatic {
            self.arbiter.offer_automatic(state);
        }
        self.dispatch(state, reason, detail).await;
    }

    /// Publish `state` if the actuator is not already there.
    ///
    /// The justifying event must already be in the log.
    async fn dispatch(&mut self, state: FanState, reason: CommandReason, detail: &str) {
        if self.fail_safe {
            tracing::debug!(%state, %reason, "fail-safe active, command withheld");
            return;
        }
        if state == self.issued {
            if let Some(superseded) = self.pending.take() {
                tracing::debug!(state = %superseded.state, "queued command superseded");
            }
            return;
        }

        let command = Command {
            state,
            mode: self.arbiter.mode(),
            timestamp: self.stamp(),
            reason,
        };

        if self.link == Link::Down {
            self.queue(command);
            return;
        }

        if let Err(err) = self.publisher.publish_command(&command).await {
            tracing::warn!(error = %err, %state, "publish failed, treating link as down");
            self.link = Link::Down;
            self.queue(command);
            let payload = serde_json::json!({ "status": "publish_failed", "reason": err.to_string() });
            let _ = self.persist(EventKind::TransportFault, payload).await;
            return;
        }

        self.issued = state;
        self.pending = None;
        self.stats.commands_published += 1;
        tracing::info!(%state, mode = %command.mode, %reason, "command published");

        if self
            .persist(EventKind::CommandIssued, command.to_event_payload())
            .await
            .is_err()
        {
            return;
        }
        self.alarm(
            AlarmLevel::Info,
            format!("Cooling fan turned {state} - {detail}"),
        )
        .await;
    }

    fn queue(&mut self, command: Command) {
        tracing::info!(state = %command.state, reason = %command.reason, "link down, command queued");
        self.stats.commands_queued += 1;
        self.pending = Some(command);
    }

    /// Append an event, retrying with backoff.
    ///
    /// Exhausted retries put the coordinator in fail-safe. While in
    /// fail-safe a single attempt is made; its success ends fail-safe.
    async fn persist(
        &mut self,
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Result<ControlEvent, CoolHubError> {
        let event = ControlEvent::new(kind, self.stamp(), payload);
        let attempts = if self.fail_safe {
            1
        } else {
            self.retry.attempts()
        };
        let mut backoff = self.retry.backoff();
        let mut attempt = 1;

        let error = loop {
            match self.log.append(event.clone()).await {
                Ok(stored) => {
                    if self.fail_safe {
                        self.leave_fail_safe().await;
                    }
                    return Ok(stored);
                }
                Err(err) if attempt < attempts => {
                    tracing::warn!(%kind, attempt, error = %err, "control log append failed, retrying");
                    tokio::time::sleep(backoff.next_delay()).await;
                    attempt += 1;
                }
                Err(err) => break err,
            }
        };

        self.stats.persistence_failures += 1;
        tracing::error!(%kind, attempts, error = %error, "control log unavailable");
        self.ensure_fail_safe().await;
        Err(error)
    }

    async fn ensure_fail_safe(&mut self) {
        if !self.fail_safe {
            self.fail_safe = true;
            tracing::error!("entering fail-safe, control halted and fan forced ON");
            self.alarm(
                AlarmLevel::Critical,
                "Persistence unavailable - control halted, cooling fan forced ON",
            )
            .await;
        }
        if self.issued == FanState::On || self.link == Link::Down {
            return;
        }
        let command = Command {
            state: FanState::On,
            mode: self.arbiter.mode(),
            timestamp: self.stamp(),
            reason: CommandReason::FailSafe,
        };
        match self.publisher.publish_command(&command).await {
            Ok(()) => {
                self.issued = FanState::On;
                self.pending = None;
                self.stats.commands_published += 1;
                tracing::warn!("fail-safe command published");
            }
            Err(err) => {
                self.link = Link::Down;
                tracing::error!(error = %err, "unable to publish fail-safe command");
            }
        }
    }

    async fn leave_fail_safe(&mut self) {
        self.fail_safe = false;
        self.recovered = true;
        tracing::info!("control log reachable again, leaving fail-safe");
        self.alarm(
            AlarmLevel::Info,
            "Persistence restored - normal control resumed",
        )
        .await;
    }

    /// Best-effort operator notification.
    async fn alarm(&mut self, level: AlarmLevel, message: impl Into<String>) {
        let alarm = Alarm::new(coolhub_domain::time::now(), level, message);
        if self.link == Link::Down {
            tracing::debug!(message = %alarm.message, "link down, alarm dropped");
            return;
        }
        match self.publisher.publish_alarm(&alarm).await {
            Ok(()) => self.stats.alarms_raised += 1,
            Err(err) => tracing::warn!(error = %err, "failed to publish alarm"),
        }
    }

    /// Next event timestamp, never earlier than the previous one.
    fn stamp(&mut self) -> Timestamp {
        let now = coolhub_domain::time::now();
        let ts = self.last_event_at.map_or(now, |last| last.max(now));
        self.last_event_at = Some(ts);
        ts
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use coolhub_domain::button::ButtonAction;
    use coolhub_domain::event::TimeRange;

    use super::*;

    /// Log and publisher in one place so tests can check call ordering.
    #[derive(Default)]
    struct Bench {
        events: Mutex<Vec<ControlEvent>>,
        commands: Mutex<Vec<Command>>,
        alarms: Mutex<Vec<Alarm>>,
        trace: Mutex<Vec<String>>,
        log_down: Mutex<bool>,
        broker_down: Mutex<bool>,
    }

    impl Bench {
        fn kinds(&self) -> Vec<EventKind> {
            self.events.lock().unwrap().iter().map(|e| e.kind).collect()
        }

        fn commands(&self) -> Vec<(FanState, CommandReason)> {
            self.commands
                .lock()
                .unwrap()
                .iter()
                .map(|c| (c.state, c.reason))
                .collect()
        }

        fn trace(&self) -> Vec<String> {
            self.trace.lock().unwrap().clone()
        }

        fn set_log_down(&self, down: bool) {
            *self.log_down.lock().unwrap() = down;
        }

        fn set_broker_down(&self, down: bool) {
            *self.broker_down.lock().unwrap() = down;
        }
    }

    impl ControlLog for Bench {
        fn append(
            &self,
            event: ControlEvent,
        ) -> impl Future<Output = Result<ControlEvent, CoolHubError>> + Send {
            let result = if *self.log_down.lock().unwrap() {
                Err(CoolHubError::Storage("disk full".into()))
            } else {
                self.trace
                    .lock()
                    .unwrap()
                    .push(format!("append {}", event.kind));
                self.events.lock().unwrap().push(event.clone());
                Ok(event)
            };
            async { result }
        }

        fn query(
            &self,
            range: TimeRange,
        ) -> impl Future<Output = Result<Vec<ControlEvent>, CoolHubError>> + Send {
            let events: Vec<_> = self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| range.contains(e.timestamp))
                .cloned()
                .collect();
            async { Ok(events) }
        }

        fn recent(
            &self,
            limit: usize,
        ) -> impl Future<Output = Result<Vec<ControlEvent>, CoolHubError>> + Send {
            let events: Vec<_> = self
                .events
                .lock()
                .unwrap()
                .iter()
                .rev()
                .take(limit)
                .cloned()
                .collect();
            async { Ok(events) }
        }

        fn last_of_kind(
            &self,
            kind: EventKind,
        ) -> impl Future<Output = Result<Option<ControlEvent>, CoolHubError>> + Send {
            let event = self
                .events
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|e| e.kind == kind)
                .cloned();
            async { Ok(event) }
        }
    }

    impl ControlPublisher for Bench {
        fn publish_command(
            &self,
            command: &Command,
        ) -> impl Future<Output = Result<(), CoolHubError>> + Send {
            let result = if *self.broker_down.lock().unwrap() {
                Err(CoolHubError::Transport("not connected".into()))
            } else {
                self.trace
                    .lock()
                    .unwrap()
                    .push(format!("publish {}", command.state));
                self.commands.lock().unwrap().push(command.clone());
                Ok(())
            };
            async { result }
        }

        fn publish_alarm(
            &self,
            alarm: &Alarm,
        ) -> impl Future<Output = Result<(), CoolHubError>> + Send {
            let result = if *self.broker_down.lock().unwrap() {
                Err(CoolHubError::Transport("not connected".into()))
            } else {
                self.alarms.lock().unwrap().push(alarm.clone());
                Ok(())
            };
            async { result }
        }
    }

    type TestCoordinator = ControlCoordinator<Arc<Bench>, Arc<Bench>>;

    fn coordinator(bench: &Arc<Bench>) -> TestCoordinator {
        let policy = HysteresisPolicy::new(22.0, 26.0).unwrap();
        let mut config = CoordinatorConfig::new(policy);
        config.persist_retry = RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
        };
        ControlCoordinator::new(config, Arc::clone(bench), Arc::clone(bench))
    }

    fn reading(temperature: f64) -> InboundMessage {
        let payload = serde_json::json!({ "temperature": temperature, "humidity": 40.0 });
        InboundMessage::Telemetry(RawTelemetry::now(payload.to_string()))
    }

    fn button(action: ButtonAction) -> InboundMessage {
        InboundMessage::Button(ButtonPress {
            action,
            pressed_at: None,
        })
    }

    #[tokio::test]
    async fn should_follow_hysteresis_band() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        for temperature in [20.0, 27.0, 24.0, 21.0] {
            coordinator.handle(reading(temperature)).await;
        }

        assert_eq!(
            bench.commands(),
            vec![
                (FanState::On, CommandReason::Threshold),
                (FanState::Off, CommandReason::Threshold),
            ]
        );
        assert_eq!(
            bench.kinds(),
            vec![
                EventKind::ReadingReceived,
                EventKind::ReadingReceived,
                EventKind::CommandIssued,
                EventKind::ReadingReceived,
                EventKind::ReadingReceived,
                EventKind::CommandIssued,
            ]
        );
        assert_eq!(coordinator.stats().readings_accepted, 4);
        assert_eq!(coordinator.stats().commands_published, 2);
    }

    #[tokio::test]
    async fn should_persist_justification_before_publishing() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        coordinator.handle(reading(27.0)).await;

        assert_eq!(
            bench.trace(),
            vec![
                "append READING_RECEIVED".to_string(),
                "publish ON".to_string(),
                "append COMMAND_ISSUED".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn should_keep_event_timestamps_ordered() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        for temperature in [20.0, 27.0, 21.0, 28.0] {
            coordinator.handle(reading(temperature)).await;
        }

        let events = bench.events.lock().unwrap();
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn should_hold_override_and_resume_policy_on_release() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        coordinator.handle(button(ButtonAction::OverrideOn)).await;
        assert_eq!(coordinator.mode(), ControlMode::Manual);
        assert_eq!(coordinator.fan_state(), FanState::On);

        coordinator.handle(reading(15.0)).await;
        assert_eq!(coordinator.fan_state(), FanState::On);

        coordinator.handle(button(ButtonAction::Release)).await;
        assert_eq!(coordinator.mode(), ControlMode::Automatic);

        assert_eq!(
            bench.commands(),
            vec![
                (FanState::On, CommandReason::Override),
                (FanState::Off, CommandReason::Release),
            ]
        );
        assert_eq!(
            bench.kinds(),
            vec![
                EventKind::ModeChanged,
                EventKind::CommandIssued,
                EventKind::ReadingReceived,
                EventKind::ModeChanged,
                EventKind::CommandIssued,
            ]
        );
        let commands = bench.commands.lock().unwrap();
        assert_eq!(commands[0].mode, ControlMode::Manual);
        assert_eq!(commands[1].mode, ControlMode::Automatic);
    }

    #[tokio::test]
    async fn should_hold_state_on_release_without_reading() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        coordinator.handle(button(ButtonAction::OverrideOn)).await;
        coordinator.handle(button(ButtonAction::Release)).await;

        assert_eq!(coordinator.mode(), ControlMode::Automatic);
        assert_eq!(coordinator.fan_state(), FanState::On);
        assert_eq!(bench.commands().len(), 1);
    }

    #[tokio::test]
    async fn should_ignore_release_in_automatic_mode() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        coordinator.handle(button(ButtonAction::Release)).await;

        assert!(bench.kinds().is_empty());
        assert!(bench.commands().is_empty());
        assert_eq!(coordinator.stats().button_presses, 1);
    }

    #[tokio::test]
    async fn should_record_adjustment_while_manual() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        coordinator.handle(button(ButtonAction::OverrideOn)).await;
        coordinator.handle(button(ButtonAction::OverrideOff)).await;

        assert_eq!(coordinator.mode(), ControlMode::Manual);
        assert_eq!(
            bench.commands(),
            vec![
                (FanState::On, CommandReason::Override),
                (FanState::Off, CommandReason::Override),
            ]
        );
        let events = bench.events.lock().unwrap();
        let adjustment = events
            .iter()
            .rev()
            .find(|e| e.kind == EventKind::ModeChanged)
            .unwrap();
        assert_eq!(adjustment.payload["from"], "MANUAL");
        assert_eq!(adjustment.payload["to"], "MANUAL");
        assert_eq!(adjustment.payload["from_state"], "ON");
        assert_eq!(adjustment.payload["to_state"], "OFF");
    }

    #[tokio::test]
    async fn should_log_mode_change_before_override_command() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        coordinator.handle(button(ButtonAction::OverrideOn)).await;

        assert_eq!(
            bench.trace(),
            vec![
                "append MODE_CHANGED".to_string(),
                "publish ON".to_string(),
                "append COMMAND_ISSUED".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn should_log_mode_change_before_release_command() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);
        coordinator.handle(button(ButtonAction::OverrideOn)).await;
        coordinator.handle(reading(15.0)).await;
        bench.trace.lock().unwrap().clear();

        coordinator.handle(button(ButtonAction::Release)).await;

        assert_eq!(
            bench.trace(),
            vec![
                "append MODE_CHANGED".to_string(),
                "publish OFF".to_string(),
                "append COMMAND_ISSUED".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_log_mode_change_before_expiry_command() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);
        coordinator.handle(button(ButtonAction::OverrideOn)).await;
        coordinator.handle(reading(15.0)).await;
        bench.trace.lock().unwrap().clear();

        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(coordinator.poll_override_expiry(monotonic_now()).await);

        assert_eq!(
            bench.trace(),
            vec![
                "append MODE_CHANGED".to_string(),
                "publish OFF".to_string(),
                "append COMMAND_ISSUED".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_stay_automatic_when_override_cannot_be_logged() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);
        coordinator.handle(InboundMessage::Link(LinkStatus::Connected)).await;

        bench.set_log_down(true);
        coordinator.handle(button(ButtonAction::OverrideOff)).await;

        assert_eq!(coordinator.mode(), ControlMode::Automatic);
        assert!(coordinator.is_fail_safe());
        assert!(bench.kinds().is_empty());

        bench.set_log_down(false);
        coordinator.handle(reading(30.0)).await;

        assert_eq!(coordinator.mode(), ControlMode::Automatic);
        assert!(!coordinator.is_fail_safe());
        assert_eq!(coordinator.fan_state(), FanState::On);
        assert_eq!(bench.commands(), vec![(FanState::On, CommandReason::FailSafe)]);
        assert_eq!(bench.kinds(), vec![EventKind::ReadingReceived]);
        assert!(
            bench
                .commands
                .lock()
                .unwrap()
                .iter()
                .all(|c| c.mode == ControlMode::Automatic)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_override_when_expiry_cannot_be_logged() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);
        coordinator.handle(button(ButtonAction::OverrideOn)).await;

        tokio::time::advance(Duration::from_secs(15)).await;
        bench.set_log_down(true);
        assert!(!coordinator.poll_override_expiry(monotonic_now()).await);

        assert_eq!(coordinator.mode(), ControlMode::Manual);
        assert!(coordinator.is_fail_safe());
        let expiry_announced = |bench: &Bench| {
            bench
                .alarms
                .lock()
                .unwrap()
                .iter()
                .any(|a| a.message.contains("expired"))
        };
        assert!(!expiry_announced(&bench));

        bench.set_log_down(false);
        coordinator.handle(reading(20.0)).await;

        assert_eq!(coordinator.mode(), ControlMode::Automatic);
        assert!(expiry_announced(&bench));
        assert_eq!(
            bench.kinds(),
            vec![
                EventKind::ModeChanged,
                EventKind::CommandIssued,
                EventKind::ModeChanged,
                EventKind::ReadingReceived,
                EventKind::CommandIssued,
            ]
        );
        assert_eq!(
            bench.commands(),
            vec![
                (FanState::On, CommandReason::Override),
                (FanState::Off, CommandReason::Threshold),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_withhold_manual_commands_while_fail_safe() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);
        coordinator.handle(button(ButtonAction::OverrideOff)).await;
        coordinator.handle(reading(24.0)).await;

        bench.set_log_down(true);
        coordinator.handle(reading(24.0)).await;
        assert_eq!(coordinator.fan_state(), FanState::On);

        // same manual state: no append, only a timer refresh
        coordinator.handle(button(ButtonAction::OverrideOff)).await;

        assert!(coordinator.is_fail_safe());
        assert_eq!(coordinator.fan_state(), FanState::On);
        assert_eq!(bench.commands(), vec![(FanState::On, CommandReason::FailSafe)]);
    }

    #[tokio::test]
    async fn should_toggle_from_current_state() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        coordinator.handle(reading(27.0)).await;
        coordinator.handle(button(ButtonAction::Toggle)).await;

        assert_eq!(coordinator.mode(), ControlMode::Manual);
        assert_eq!(coordinator.fan_state(), FanState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn should_expire_override_after_ttl() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        coordinator.handle(button(ButtonAction::OverrideOn)).await;
        coordinator.handle(reading(20.0)).await;

        tokio::time::advance(Duration::from_secs(14)).await;
        assert!(!coordinator.poll_override_expiry(monotonic_now()).await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(coordinator.poll_override_expiry(monotonic_now()).await);

        assert_eq!(coordinator.mode(), ControlMode::Automatic);
        assert_eq!(
            bench.commands(),
            vec![
                (FanState::On, CommandReason::Override),
                (FanState::Off, CommandReason::OverrideExpired),
            ]
        );
        let events = bench.events.lock().unwrap();
        let expiry = events
            .iter()
            .rev()
            .find(|e| e.kind == EventKind::ModeChanged)
            .unwrap();
        assert_eq!(expiry.payload["trigger"], "timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn should_let_button_win_over_timeout() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        coordinator.handle(button(ButtonAction::OverrideOn)).await;
        tokio::time::advance(Duration::from_secs(15)).await;
        coordinator.handle(button(ButtonAction::OverrideOn)).await;

        assert!(!coordinator.poll_override_expiry(monotonic_now()).await);
        assert_eq!(coordinator.mode(), ControlMode::Manual);
    }

    #[tokio::test]
    async fn should_recompute_instead_of_replaying_after_reconnect() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);
        coordinator.handle(InboundMessage::Link(LinkStatus::Connected)).await;

        bench.set_broker_down(true);
        coordinator.handle(reading(27.0)).await;
        assert_eq!(
            coordinator.pending_command().map(|c| c.state),
            Some(FanState::On)
        );
        coordinator
            .handle(InboundMessage::Link(LinkStatus::Disconnected {
                reason: "connection reset".into(),
            }))
            .await;

        coordinator.handle(reading(21.0)).await;

        bench.set_broker_down(false);
        coordinator.handle(InboundMessage::Link(LinkStatus::Connected)).await;

        assert!(bench.commands().is_empty());
        assert!(coordinator.pending_command().is_none());
        assert_eq!(coordinator.fan_state(), FanState::Off);
        let events = bench.events.lock().unwrap();
        let statuses: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::TransportFault)
            .map(|e| e.payload["status"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(statuses, vec!["publish_failed", "reconnected"]);
    }

    #[tokio::test]
    async fn should_publish_recomputed_command_on_reconnect() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        bench.set_broker_down(true);
        coordinator
            .handle(InboundMessage::Link(LinkStatus::Disconnected {
                reason: "broker unreachable".into(),
            }))
            .await;
        coordinator.handle(reading(27.0)).await;
        assert_eq!(coordinator.stats().commands_queued, 1);

        bench.set_broker_down(false);
        coordinator.handle(InboundMessage::Link(LinkStatus::Connected)).await;

        assert_eq!(bench.commands(), vec![(FanState::On, CommandReason::Resync)]);
        assert!(coordinator.snapshot().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn should_enter_and_leave_fail_safe() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        bench.set_log_down(true);
        coordinator.handle(reading(20.0)).await;

        assert!(coordinator.is_fail_safe());
        assert_eq!(bench.commands(), vec![(FanState::On, CommandReason::FailSafe)]);
        assert!(
            bench
                .alarms
                .lock()
                .unwrap()
                .iter()
                .any(|a| a.level == AlarmLevel::Critical)
        );

        coordinator.handle(reading(20.0)).await;
        assert_eq!(bench.commands().len(), 1);

        bench.set_log_down(false);
        coordinator.handle(reading(20.0)).await;

        assert!(!coordinator.is_fail_safe());
        assert_eq!(
            bench.commands(),
            vec![
                (FanState::On, CommandReason::FailSafe),
                (FanState::Off, CommandReason::Threshold),
            ]
        );
        assert_eq!(coordinator.stats().persistence_failures, 2);
    }

    #[tokio::test]
    async fn should_count_rejected_telemetry() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);

        coordinator
            .handle(InboundMessage::Telemetry(RawTelemetry::now("garbage")))
            .await;
        let out_of_range = serde_json::json!({ "temperature": 500.0, "humidity": 40.0 });
        coordinator
            .handle(InboundMessage::Telemetry(RawTelemetry::now(
                out_of_range.to_string(),
            )))
            .await;

        assert_eq!(coordinator.stats().readings_rejected, 2);
        assert!(bench.kinds().is_empty());
        assert_eq!(coordinator.mode(), ControlMode::Automatic);
    }

    #[tokio::test]
    async fn should_restore_last_issued_state() {
        let bench = Arc::new(Bench::default());
        {
            let mut first = coordinator(&bench);
            first.handle(reading(27.0)).await;
        }

        let mut second = coordinator(&bench);
        let restored = second.restore().await.unwrap();
        assert_eq!(restored, Some(FanState::On));

        second.handle(reading(24.0)).await;
        assert_eq!(second.fan_state(), FanState::On);
        assert_eq!(bench.commands().len(), 1);
    }

    #[tokio::test]
    async fn should_restore_nothing_from_empty_log() {
        let bench = Arc::new(Bench::default());
        let mut coordinator = coordinator(&bench);
        assert_eq!(coordinator.restore().await.unwrap(), None);
        assert_eq!(coordinator.fan_state(), FanState::Off);
    }
}
