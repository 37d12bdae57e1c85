use std::sync::Arc;

use lashbook_core::clock::{Clock, SystemClock};
use lashbook_core::config::{AppConfig, ConfigError, LoadOptions};
use lashbook_core::identity::StaticAdminDirectory;
use lashbook_core::notify::Notifier;
use lashbook_db::{connect_with_config, migrations, DbPool};
use lashbook_engine::{ConversationEngine, ReminderScheduler, ReservationEngine, Storage};
use thiserror::Error;
use tracing::info;

use crate::transport::{ChatRunner, ChatTransport, NoopChatTransport, ReconnectPolicy};
use crate::transport::TransportNotifier;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub conversations: Arc<ConversationEngine>,
    pub reminders: Arc<ReminderScheduler>,
    pub clock: Arc<dyn Clock>,
    pub chat_runner: ChatRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config, Arc::new(NoopChatTransport)).await
}

pub async fn bootstrap_with_config(
    config: AppConfig,
    transport: Arc<dyn ChatTransport>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let zone = config.booking.zone()?;

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let storage = Storage::sql(db_pool.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(zone));
    let notifier: Arc<dyn Notifier> = Arc::new(TransportNotifier::new(transport.clone()));
    let admins = Arc::new(StaticAdminDirectory::new(
        &config.bot.admin_handles,
        config.bot.admin_chat_ids.clone(),
    ));

    let reservations = Arc::new(ReservationEngine::new(
        storage.clone(),
        notifier.clone(),
        admins,
        clock.clone(),
    ));
    let conversations = Arc::new(ConversationEngine::new(
        reservations,
        clock.clone(),
        config.booking.horizon_days,
    ));
    let reminders = Arc::new(ReminderScheduler::from_config(
        storage.appointments.clone(),
        notifier,
        clock.clone(),
        zone,
        &config.reminders,
    ));
    let chat_runner = ChatRunner::new(transport, conversations.clone(), ReconnectPolicy::default());

    Ok(Application { config, db_pool, conversations, reminders, clock, chat_runner })
}
