//! Publisher port — outbound messages to the actuator and operators.

use std::future::Future;

use coolhub_domain::alarm::Alarm;
use coolhub_domain::command::Command;
use coolhub_domain::error::CoolHubError;

/// Sends commands to the relay and alarms to whoever listens.
///
/// An error means the message was **not** handed to the transport; the
/// coordinator then treats the link as down and queues the command.
pub trait ControlPublisher {
    /// Publish a command on the actuator topic.
    fn publish_command(
        &self,
        command: &Command,
    ) -> impl Future<Output = Result<(), CoolHubError>> + Send;

    /// Publish an operator-facing alarm. Best effort.
    fn publish_alarm(&self, alarm: &Alarm) -> impl Future<Output = Result<(), CoolHubError>> + Send;
}

impl<T: ControlPublisher + Send + Sync> ControlPublisher for std::sync::Arc<T> {
    fn publish_command(
        &self,
        command: &Command,
    ) -> impl Future<Output = Result<(), CoolHubError>> + Send {
        (**self).publish_command(command)
    }

    fn publish_alarm(&self, alarm: &Alarm) -> impl Future<Output = Result<(), CoolHubError>> + Send {
        (**self).publish_alarm(alarm)
    }
}
