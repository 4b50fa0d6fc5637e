//! Coordinator task: drains the inbound queue and fires the override timer.

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::{ControlCoordinator, ControlStats, StatusSnapshot, monotonic_now};
use crate::inbound::InboundMessage;
use crate::ports::{ControlLog, ControlPublisher};

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl<L, P> ControlCoordinator<L, P>
where
    L: ControlLog,
    P: ControlPublisher,
{
    /// Run until every sender of `inbox` is dropped, then return the final
    /// statistics.
    ///
    /// Messages are preferred over the timer so a button press processed at
    /// the deadline keeps the override alive. The timer is disarmed while
    /// fail-safe is active. `status` is refreshed after every step.
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<InboundMessage>,
        status: watch::Sender<StatusSnapshot>,
    ) -> ControlStats {
        tracing::info!(
            mode = %self.mode(),
            fan = %self.fan_state(),
            t_low = self.policy.t_low(),
            t_high = self.policy.t_high(),
            "control coordinator started"
        );
        status.send_replace(self.snapshot());

        loop {
            // while fail-safe, expiry is retried with the next message
            let deadline = if self.fail_safe {
                None
            } else {
                self.arbiter.deadline().map(Instant::from_std)
            };
            tokio::select! {
                biased;
                message = inbox.recv() => {
                    let Some(message) = message else { break };
                    self.handle(message).await;
                }
                () = sleep_until_deadline(deadline) => {
                    self.poll_override_expiry(monotonic_now()).await;
                }
            }
            status.send_replace(self.snapshot());
        }

        tracing::info!("inbound queue closed, control coordinator stopped");
        self.stats
    }
}
