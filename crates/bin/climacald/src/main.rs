//! # climacald: climacal daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct the virtual calendar and thermostats from configuration
//! - Construct the coordinator, restore the persisted flag and start the
//!   poll loop
//! - Build the axum router, bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, watch};
use tracing_subscriber::EnvFilter;

use climacal_adapter_http_axum::state::AppState;
use climacal_adapter_storage_sqlite_sqlx::Config as StorageConfig;
use climacal_adapter_virtual::{VirtualCalendar, VirtualThermostats};
use climacal_app::coordinator::Coordinator;
use climacal_app::notification_bus::InProcessNotificationBus;
use climacal_domain::notification::Notification;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.logging.filter);

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open database")?;
    let store = db.flag_store();

    // Adapters
    let calendar = VirtualCalendar::new(config.calendar.events.clone());
    let thermostats = VirtualThermostats::new(config.devices.iter().cloned());

    // Notifications
    let bus = Arc::new(InProcessNotificationBus::new(256));
    tokio::spawn(log_notifications(bus.subscribe()));

    // Coordinator
    let coordinator = Arc::new(Coordinator::new(
        calendar,
        thermostats,
        store,
        Arc::clone(&bus),
        config.rules(),
        config.coordinator_settings()?,
    )?);
    coordinator
        .restore_flag()
        .await
        .context("failed to restore override flag")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poll_loop = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.run(wait_for_shutdown(shutdown_rx)).await }
    });

    // HTTP
    let app = climacal_adapter_http_axum::router::build(AppState::new(coordinator, bus));
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(
        addr = %bind_addr,
        dry_run = config.engine.dry_run,
        "climacald listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    poll_loop.await.context("poll loop panicked")?;
    Ok(())
}

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();
}

async fn log_notifications(mut receiver: broadcast::Receiver<Notification>) {
    loop {
        match receiver.recv().await {
            Ok(notification) => tracing::info!(
                kind = notification.kind.as_str(),
                device = ?notification.device_id,
                data = %notification.data,
                "notification"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn wait_for_shutdown(mut receiver: watch::Receiver<bool>) {
    let _ = receiver.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for ctrl-c");
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
                tracing::error!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown requested");
}
