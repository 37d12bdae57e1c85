use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use lashbook_core::clock::Clock;
use lashbook_core::config::ReminderConfig;
use lashbook_core::domain::appointment::{Appointment, ReminderKind};
use lashbook_core::notify::Notifier;
use lashbook_core::reminders::ReminderPolicy;
use lashbook_db::{AppointmentRepository, RepositoryError};

use crate::notices;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub sent: usize,
    pub failed: usize,
    /// Appointments already past the grace period.
    pub skipped: usize,
}

/// The most recent sweep that loaded the ledger, for readiness reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LastSweep {
    pub finished_at: DateTime<FixedOffset>,
    pub report: SweepReport,
}

/// Periodic sweep that sends day-before and hour-before reminders.
///
/// Exactly-once delivery per slot comes from the persisted reminder flags, not from the sweep
/// timing: a flag is only set after the notifier confirmed delivery, so a failed send is retried
/// by the next sweep that still falls inside the window and dropped once the window has closed.
pub struct ReminderScheduler {
    appointments: Arc<dyn AppointmentRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    policy: ReminderPolicy,
    zone: FixedOffset,
    sweep_interval: Duration,
    last_sweep: Mutex<Option<LastSweep>>,
}

impl ReminderScheduler {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        policy: ReminderPolicy,
        zone: FixedOffset,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            appointments,
            notifier,
            clock,
            policy,
            zone,
            sweep_interval,
            last_sweep: Mutex::new(None),
        }
    }

    pub fn from_config(
        appointments: Arc<dyn AppointmentRepository>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        zone: FixedOffset,
        config: &ReminderConfig,
    ) -> Self {
        Self::new(
            appointments,
            notifier,
            clock,
            ReminderPolicy::from_config(config),
            zone,
            Duration::from_secs(config.sweep_interval_secs.max(1)),
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// `None` until a sweep has completed.
    pub async fn last_sweep(&self) -> Option<LastSweep> {
        *self.last_sweep.lock().await
    }

    pub async fn sweep(&self) -> Result<SweepReport, RepositoryError> {
        let now = self.clock.now();
        let from = (now - self.policy.past_grace).with_timezone(&self.zone).date_naive();
        let appointments = self.appointments.list_active_since(from).await?;

        let mut report = SweepReport::default();
        for appointment in appointments {
            report.scanned += 1;
            let starts_at = appointment.slot.starts_at(self.zone);
            if self.policy.is_stale(starts_at, now) {
                report.skipped += 1;
                continue;
            }

            for kind in self.policy.due(starts_at, now, appointment.reminders) {
                if self.fire(&appointment, kind, now.with_timezone(&Utc)).await {
                    report.sent += 1;
                } else {
                    report.failed += 1;
                }
            }
        }

        *self.last_sweep.lock().await = Some(LastSweep { finished_at: self.clock.now(), report });
        Ok(report)
    }

    /// Sends one reminder and records it. Returns whether the notice was delivered.
    async fn fire(
        &self,
        appointment: &Appointment,
        kind: ReminderKind,
        now: DateTime<Utc>,
    ) -> bool {
        let text = notices::reminder(kind, appointment);
        if let Err(error) = self.notifier.send(&appointment.owner, &text).await {
            warn!(
                event_name = "reminder.sweep.delivery_failed",
                correlation_id = %appointment.id,
                kind = kind.as_str(),
                slot = %appointment.slot,
                error = %error,
                "reminder delivery failed; will retry while the window is open"
            );
            return false;
        }

        let marked = self
            .appointments
            .mark_reminder_sent(&appointment.id, &appointment.slot, kind, now)
            .await;
        match marked {
            Ok(true) => {
                info!(
                    event_name = "reminder.sweep.sent",
                    correlation_id = %appointment.id,
                    kind = kind.as_str(),
                    slot = %appointment.slot,
                    "reminder sent"
                );
            }
            Ok(false) => {
                debug!(
                    event_name = "reminder.sweep.flag_skipped",
                    correlation_id = %appointment.id,
                    kind = kind.as_str(),
                    "appointment changed while its reminder was in flight"
                );
            }
            Err(error) => {
                warn!(
                    event_name = "reminder.sweep.flag_failed",
                    correlation_id = %appointment.id,
                    kind = kind.as_str(),
                    error = %error,
                    "reminder sent but its flag was not recorded"
                );
            }
        }
        true
    }

    /// Sweeps forever at the configured interval. The first sweep runs immediately.
    pub async fn run(&self) {
        let mut ticker = interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            event_name = "reminder.scheduler.started",
            correlation_id = "reminders",
            sweep_interval_secs = self.sweep_interval.as_secs(),
            "reminder scheduler started"
        );

        loop {
            ticker.tick().await;
            match self.sweep().await {
                Ok(report) if report.sent > 0 || report.failed > 0 => {
                    info!(
                        event_name = "reminder.sweep.completed",
                        correlation_id = "reminders",
                        scanned = report.scanned,
                        sent = report.sent,
                        failed = report.failed,
                        skipped = report.skipped,
                        "reminder sweep completed"
                    );
                }
                Ok(report) => {
                    debug!(
                        event_name = "reminder.sweep.completed",
                        correlation_id = "reminders",
                        scanned = report.scanned,
                        "reminder sweep completed with nothing due"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "reminder.sweep.failed",
                        correlation_id = "reminders",
                        error = %error,
                        "reminder sweep could not load appointments (non-fatal)"
                    );
                }
            }
        }
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
