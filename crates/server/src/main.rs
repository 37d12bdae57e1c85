mod bootstrap;
mod commands;
mod health;
mod render;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use lashbook_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use lashbook_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let transport = Arc::new(transport::NoopChatTransport);
    let app = bootstrap::bootstrap_with_config(config, transport).await?;

    let health_task = health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::ReadinessState {
            db_pool: app.db_pool.clone(),
            reminders: app.reminders.clone(),
            clock: app.clock.clone(),
        },
    )
    .await?;

    let reminder_task = app.reminders.clone().spawn();
    let chat_runner = app.chat_runner;
    let chat_task = tokio::spawn(async move { chat_runner.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        utc_offset = %app.config.booking.utc_offset,
        "lashbook-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "lashbook-server stopping"
    );

    chat_task.abort();
    reminder_task.abort();
    health_task.abort();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, app.db_pool.close()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = app.config.server.graceful_shutdown_secs,
            "database pool did not close within the shutdown grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
