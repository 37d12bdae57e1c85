use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::service::ServiceSelection;
use crate::domain::slot::SlotKey;
use crate::errors::DomainError;
use crate::identity::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

impl AppointmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Active,
    Canceled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub phone: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    DayBefore,
    HourBefore,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DayBefore => "day_before",
            Self::HourBefore => "hour_before",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderFlags {
    pub day_sent: bool,
    pub hour_sent: bool,
}

impl ReminderFlags {
    pub fn is_sent(&self, kind: ReminderKind) -> bool {
        match kind {
            ReminderKind::DayBefore => self.day_sent,
            ReminderKind::HourBefore => self.hour_sent,
        }
    }

    pub fn mark(&mut self, kind: ReminderKind) {
        match kind {
            ReminderKind::DayBefore => self.day_sent = true,
            ReminderKind::HourBefore => self.hour_sent = true,
        }
    }
}

/// Everything a client supplies when claiming a slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub owner: UserId,
    pub owner_handle: Option<String>,
    pub contact: ContactDetails,
    pub selection: ServiceSelection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub slot: SlotKey,
    pub owner: UserId,
    pub owner_handle: Option<String>,
    pub contact: ContactDetails,
    pub selection: ServiceSelection,
    pub status: AppointmentStatus,
    pub reminders: ReminderFlags,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn create(slot: SlotKey, details: NewAppointment, now: DateTime<Utc>) -> Self {
        Self {
            id: AppointmentId::generate(),
            slot,
            owner: details.owner,
            owner_handle: details.owner_handle,
            contact: details.contact,
            selection: details.selection,
            status: AppointmentStatus::Active,
            reminders: ReminderFlags::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AppointmentStatus::Active
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        matches!((self.status, next), (AppointmentStatus::Active, AppointmentStatus::Canceled))
    }

    pub fn transition_to(
        &mut self,
        next: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            self.updated_at = now;
            return Ok(());
        }

        Err(DomainError::InvalidAppointmentTransition { from: self.status, to: next })
    }

    /// Repoints an active appointment and clears both reminder flags.
    pub fn reschedule(&mut self, target: SlotKey, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(DomainError::InvariantViolation(format!(
                "appointment {} is not active and cannot be moved",
                self.id
            )));
        }
        self.slot = target;
        self.reminders = ReminderFlags::default();
        self.updated_at = now;
        Ok(())
    }
}
