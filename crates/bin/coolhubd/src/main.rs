//! # coolhubd — cooling controller daemon
//!
//! Composition root that wires all adapters together and runs the control loop.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Restore the last issued fan state from the control log
//! - Spawn the control coordinator and drive the MQTT transport
//! - Handle graceful shutdown (SIGTERM/SIGINT) and report final statistics
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use anyhow::Context;
use coolhub_adapter_storage_sqlite_sqlx::SqliteControlLog;
use coolhub_app::coordinator::{ControlCoordinator, StatusSnapshot};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Database
    let db = config
        .storage()
        .build()
        .await
        .context("failed to open control log database")?;
    let log = SqliteControlLog::new(db.pool().clone());

    // MQTT
    let (publisher, transport) = coolhub_adapter_mqtt::connect(&config.mqtt);

    // Coordinator
    let mut coordinator = ControlCoordinator::new(config.coordinator()?, log, publisher);
    if coordinator
        .restore()
        .await
        .context("failed to restore control state")?
        .is_none()
    {
        tracing::info!("no previous command found, fan assumed OFF");
    }

    let (inbox_tx, inbox_rx) = mpsc::channel(config.control.queue_capacity);
    let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());
    let coordinator_task = tokio::spawn(coordinator.run(inbox_rx, status_tx));
    let status_task = tokio::spawn(report_status_changes(status_rx.clone()));

    tracing::info!(
        broker = %config.mqtt.broker_host,
        port = config.mqtt.broker_port,
        t_low = config.control.t_low,
        t_high = config.control.t_high,
        "coolhubd started"
    );

    // Runs until a signal arrives; dropping the sender lets the coordinator
    // drain its queue and stop.
    transport.run(inbox_tx, shutdown_signal()).await;

    let stats = coordinator_task
        .await
        .context("control coordinator task failed")?;
    if let Err(err) = status_task.await {
        tracing::warn!(error = %err, "status reporter task failed");
    }
    let last = status_rx.borrow().clone();

    tracing::info!(
        mode = %last.mode,
        fan = %last.fan,
        readings_accepted = stats.readings_accepted,
        readings_rejected = stats.readings_rejected,
        button_presses = stats.button_presses,
        commands_published = stats.commands_published,
        commands_queued = stats.commands_queued,
        alarms_raised = stats.alarms_raised,
        persistence_failures = stats.persistence_failures,
        "coolhubd stopped"
    );

    db.close().await;
    Ok(())
}

/// Log operator-relevant changes of the status snapshot until the
/// coordinator stops.
async fn report_status_changes(mut status: watch::Receiver<StatusSnapshot>) {
    let mut previous = status.borrow_and_update().clone();
    while status.changed().await.is_ok() {
        let current = status.borrow_and_update().clone();
        if current.mode != previous.mode
            || current.fan != previous.fan
            || current.connected != previous.connected
            || current.fail_safe != previous.fail_safe
        {
            tracing::info!(
                mode = %current.mode,
                fan = %current.fan,
                connected = current.connected,
                fail_safe = current.fail_safe,
                temperature = ?current.latest_temperature,
                "status changed"
            );
        }
        previous = current;
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "unable to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::warn!(signal = "SIGINT", "shutting down"),
        () = terminate => tracing::warn!(signal = "SIGTERM", "shutting down"),
    }
}
