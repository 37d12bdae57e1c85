use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, FixedOffset};
use lashbook_core::clock::Clock;
use lashbook_core::domain::slot::DATE_FORMAT;
use lashbook_db::DbPool;
use lashbook_engine::ReminderScheduler;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A sweep older than this many intervals means the reminder task has stalled or died.
const STALE_SWEEP_INTERVALS: u32 = 3;

#[derive(Clone)]
pub struct ReadinessState {
    pub db_pool: DbPool,
    pub reminders: Arc<ReminderScheduler>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    /// The reminder task has not finished its first sweep yet.
    Starting,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerStatus {
    pub status: Readiness,
    pub open_slots_ahead: Option<i64>,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReminderStatus {
    pub status: Readiness,
    pub last_sweep_at: Option<String>,
    pub last_sent: usize,
    pub last_failed: usize,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub status: Readiness,
    pub ledger: LedgerStatus,
    pub reminders: ReminderStatus,
    pub checked_at: String,
}

pub fn router(state: ReadinessState) -> Router {
    Router::new().route("/health", get(readiness)).with_state(state)
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    state: ReadinessState,
) -> std::io::Result<JoinHandle<()>> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.readiness.listening",
        correlation_id = "bootstrap",
        bind_address = %address,
        "readiness endpoint listening"
    );

    Ok(tokio::spawn(async move {
        if let Err(serve_error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.readiness.stopped",
                correlation_id = "bootstrap",
                error = %serve_error,
                "readiness endpoint stopped serving"
            );
        }
    }))
}

pub async fn readiness(
    State(state): State<ReadinessState>,
) -> (StatusCode, Json<ReadinessReport>) {
    let now = state.clock.now();
    let ledger = ledger_status(&state.db_pool, now).await;
    let reminders = reminder_status(&state.reminders, now).await;

    let status = ledger.status.max(reminders.status);
    let code = match status {
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
        Readiness::Ready | Readiness::Starting => StatusCode::OK,
    };
    let report = ReadinessReport { status, ledger, reminders, checked_at: now.to_rfc3339() };
    (code, Json(report))
}

/// Counts bookable slots from today on, which also proves the migrated schema is reachable.
async fn ledger_status(pool: &DbPool, now: DateTime<FixedOffset>) -> LedgerStatus {
    let today = now.date_naive().format(DATE_FORMAT).to_string();
    let counted = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM slot WHERE is_open = 1 AND slot_date >= ?",
    )
    .bind(&today)
    .fetch_one(pool)
    .await;

    match counted {
        Ok(open) => LedgerStatus {
            status: Readiness::Ready,
            open_slots_ahead: Some(open),
            detail: format!("{open} open slots from {today} on"),
        },
        Err(query_error) => LedgerStatus {
            status: Readiness::Degraded,
            open_slots_ahead: None,
            detail: format!("slot ledger unreachable: {query_error}"),
        },
    }
}

async fn reminder_status(
    reminders: &ReminderScheduler,
    now: DateTime<FixedOffset>,
) -> ReminderStatus {
    let Some(last) = reminders.last_sweep().await else {
        return ReminderStatus {
            status: Readiness::Starting,
            last_sweep_at: None,
            last_sent: 0,
            last_failed: 0,
            detail: "no reminder sweep has completed yet".to_string(),
        };
    };

    let allowed = reminders.sweep_interval() * STALE_SWEEP_INTERVALS;
    let age = (now - last.finished_at).to_std().unwrap_or_default();
    let (status, detail) = if age > allowed {
        (
            Readiness::Degraded,
            format!("last sweep {}s ago exceeds {}s", age.as_secs(), allowed.as_secs()),
        )
    } else {
        (Readiness::Ready, format!("last sweep scanned {} appointments", last.report.scanned))
    };

    ReminderStatus {
        status,
        last_sweep_at: Some(last.finished_at.to_rfc3339()),
        last_sent: last.report.sent,
        last_failed: last.report.failed,
        detail,
    }
}
