use chrono::{DateTime, Duration, FixedOffset};

use crate::config::ReminderConfig;
use crate::domain::appointment::{ReminderFlags, ReminderKind};

/// Trigger windows for the time-relative reminders.
///
/// A reminder with lead `L` and width `W` is due while
/// `L - W < starts_at - now <= L` and its flag is unset. Sweep timing only
/// decides how early inside the window the reminder goes out; the persisted
/// flag alone makes it fire once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub day_lead: Duration,
    pub day_window: Duration,
    pub hour_lead: Duration,
    pub hour_window: Duration,
    pub past_grace: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self::from_config(&ReminderConfig::default())
    }
}

impl ReminderPolicy {
    pub fn from_config(config: &ReminderConfig) -> Self {
        Self {
            day_lead: minutes(config.day_lead_mins),
            day_window: minutes(config.day_window_mins),
            hour_lead: minutes(config.hour_lead_mins),
            hour_window: minutes(config.hour_window_mins),
            past_grace: minutes(config.past_grace_mins),
        }
    }

    /// Appointments that began more than `past_grace` ago are no longer considered.
    pub fn is_stale(&self, starts_at: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> bool {
        starts_at - now < -self.past_grace
    }

    pub fn in_window(
        &self,
        kind: ReminderKind,
        starts_at: DateTime<FixedOffset>,
        now: DateTime<FixedOffset>,
    ) -> bool {
        let (lead, width) = match kind {
            ReminderKind::DayBefore => (self.day_lead, self.day_window),
            ReminderKind::HourBefore => (self.hour_lead, self.hour_window),
        };
        let until = starts_at - now;
        until <= lead && until > lead - width
    }

    pub fn due(
        &self,
        starts_at: DateTime<FixedOffset>,
        now: DateTime<FixedOffset>,
        flags: ReminderFlags,
    ) -> Vec<ReminderKind> {
        if self.is_stale(starts_at, now) {
            return Vec::new();
        }

        [ReminderKind::DayBefore, ReminderKind::HourBefore]
            .into_iter()
            .filter(|kind| !flags.is_sent(*kind) && self.in_window(*kind, starts_at, now))
            .collect()
    }
}

fn minutes(value: u64) -> Duration {
    Duration::minutes(i64::try_from(value).unwrap_or(i64::MAX / 60_000))
}
