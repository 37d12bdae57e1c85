use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

use lashbook_core::domain::appointment::{
    Appointment, AppointmentId, AppointmentStatus, NewAppointment, ReminderKind,
};
use lashbook_core::domain::booking::{CancelOutcome, Rescheduled};
use lashbook_core::domain::slot::{Slot, SlotKey, DATE_FORMAT, TIME_FORMAT};
use lashbook_core::errors::{ApplicationError, BookingRejection, DomainError};
use lashbook_core::identity::UserId;

pub mod appointment;
pub mod memory;
pub mod reservation;
pub mod slot;

pub use appointment::SqlAppointmentRepository;
pub use memory::InMemoryBookingStore;
pub use reservation::SqlReservationStore;
pub use slot::SqlSlotRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Failure of an atomic reservation operation.
#[derive(Debug, Error)]
pub enum ReservationError {
    #[error(transparent)]
    Rejected(#[from] BookingRejection),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for ReservationError {
    fn from(value: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(value))
    }
}

impl ReservationError {
    pub fn rejection(&self) -> Option<&BookingRejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Repository(_) => None,
        }
    }
}

impl From<ReservationError> for ApplicationError {
    fn from(value: ReservationError) -> Self {
        match value {
            ReservationError::Rejected(rejection) => Self::Domain(DomainError::Rejected(rejection)),
            ReservationError::Repository(error) => Self::Persistence(error.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotRemoval {
    Deleted,
    NotFound,
    /// Some appointment, active or canceled, still points at the slot.
    Referenced,
}

#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Returns `false` when the slot already existed; the existing row is left untouched.
    async fn insert_slot(
        &self,
        key: SlotKey,
        created_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn find_slot(&self, key: &SlotKey) -> Result<Option<Slot>, RepositoryError>;

    /// Slots of one day ordered by time.
    async fn list_for_date(
        &self,
        date: NaiveDate,
        open_only: bool,
    ) -> Result<Vec<Slot>, RepositoryError>;

    async fn delete_slot(&self, key: &SlotKey) -> Result<SlotRemoval, RepositoryError>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &AppointmentId)
        -> Result<Option<Appointment>, RepositoryError>;

    /// Active appointments of one owner on or after `from`, earliest first.
    async fn list_for_owner(
        &self,
        owner: &UserId,
        from: NaiveDate,
    ) -> Result<Vec<Appointment>, RepositoryError>;

    async fn list_for_date(
        &self,
        date: NaiveDate,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, RepositoryError>;

    async fn list_active_since(&self, from: NaiveDate)
        -> Result<Vec<Appointment>, RepositoryError>;

    /// Sets one reminder flag if the appointment is still active on `slot` and the flag is unset.
    async fn mark_reminder_sent(
        &self,
        id: &AppointmentId,
        slot: &SlotKey,
        kind: ReminderKind,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}

/// The atomic reservation operations. Each call either applies completely or not at all.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn book(
        &self,
        slot: SlotKey,
        details: NewAppointment,
        now: DateTime<Utc>,
    ) -> Result<Appointment, ReservationError>;

    async fn cancel(
        &self,
        id: &AppointmentId,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, ReservationError>;

    async fn reschedule(
        &self,
        id: &AppointmentId,
        target: SlotKey,
        now: DateTime<Utc>,
    ) -> Result<Rescheduled, ReservationError>;
}

pub(crate) fn parse_slot_key(date: &str, time: &str) -> Result<SlotKey, RepositoryError> {
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|error| RepositoryError::Decode(format!("invalid slot_date `{date}` ({error})")))?;
    let time = NaiveTime::parse_from_str(time, TIME_FORMAT)
        .map_err(|error| RepositoryError::Decode(format!("invalid slot_time `{time}` ({error})")))?;
    Ok(SlotKey::new(date, time))
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn date_param(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
