use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use lashbook_core::domain::appointment::{
    Appointment, AppointmentId, AppointmentStatus, NewAppointment, ReminderKind,
};
use lashbook_core::domain::booking::{CancelOutcome, Rescheduled};
use lashbook_core::domain::slot::{Slot, SlotKey};
use lashbook_core::errors::BookingRejection;
use lashbook_core::identity::UserId;

use super::{
    AppointmentRepository, RepositoryError, ReservationError, ReservationStore, SlotRemoval,
    SlotRepository,
};

/// Slots and appointments behind one lock, so every check-then-mutate runs as a unit.
#[derive(Default)]
pub struct InMemoryBookingStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    slots: BTreeMap<SlotKey, Slot>,
    appointments: BTreeMap<AppointmentId, Appointment>,
}

impl MemoryState {
    fn unavailable(&self, slot: SlotKey) -> BookingRejection {
        if self.slots.contains_key(&slot) {
            BookingRejection::SlotTaken(slot)
        } else {
            BookingRejection::SlotNotFound(slot)
        }
    }

    fn is_open(&self, slot: &SlotKey) -> bool {
        self.slots.get(slot).is_some_and(|slot| slot.is_open)
    }

    fn set_open(&mut self, slot: &SlotKey, is_open: bool) {
        if let Some(slot) = self.slots.get_mut(slot) {
            slot.is_open = is_open;
        }
    }

    fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
        appointments.sort_by(|left, right| {
            left.slot.cmp(&right.slot).then(left.created_at.cmp(&right.created_at))
        });
        appointments
    }
}

#[async_trait::async_trait]
impl SlotRepository for InMemoryBookingStore {
    async fn insert_slot(
        &self,
        key: SlotKey,
        created_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.slots.contains_key(&key) {
            return Ok(false);
        }
        state.slots.insert(key, Slot { key, is_open: true, created_at });
        Ok(true)
    }

    async fn find_slot(&self, key: &SlotKey) -> Result<Option<Slot>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.slots.get(key).cloned())
    }

    async fn list_for_date(
        &self,
        date: NaiveDate,
        open_only: bool,
    ) -> Result<Vec<Slot>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .slots
            .values()
            .filter(|slot| slot.key.date == date && (slot.is_open || !open_only))
            .cloned()
            .collect())
    }

    async fn delete_slot(&self, key: &SlotKey) -> Result<SlotRemoval, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.slots.contains_key(key) {
            return Ok(SlotRemoval::NotFound);
        }
        if state.appointments.values().any(|appointment| &appointment.slot == key) {
            return Ok(SlotRemoval::Referenced);
        }
        state.slots.remove(key);
        Ok(SlotRemoval::Deleted)
    }
}

#[async_trait::async_trait]
impl AppointmentRepository for InMemoryBookingStore {
    async fn find_by_id(
        &self,
        id: &AppointmentId,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.appointments.get(id).cloned())
    }

    async fn list_for_owner(
        &self,
        owner: &UserId,
        from: NaiveDate,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(MemoryState::sorted(
            state
                .appointments
                .values()
                .filter(|appointment| {
                    &appointment.owner == owner
                        && appointment.is_active()
                        && appointment.slot.date >= from
                })
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_date(
        &self,
        date: NaiveDate,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(MemoryState::sorted(
            state
                .appointments
                .values()
                .filter(|appointment| {
                    appointment.slot.date == date
                        && status.map_or(true, |status| appointment.status == status)
                })
                .cloned()
                .collect(),
        ))
    }

    async fn list_active_since(
        &self,
        from: NaiveDate,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(MemoryState::sorted(
            state
                .appointments
                .values()
                .filter(|appointment| appointment.is_active() && appointment.slot.date >= from)
                .cloned()
                .collect(),
        ))
    }

    async fn mark_reminder_sent(
        &self,
        id: &AppointmentId,
        slot: &SlotKey,
        kind: ReminderKind,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(appointment) = state.appointments.get_mut(id) else {
            return Ok(false);
        };
        let current = appointment.is_active() && &appointment.slot == slot;
        if !current || appointment.reminders.is_sent(kind) {
            return Ok(false);
        }
        appointment.reminders.mark(kind);
        appointment.updated_at = at;
        Ok(true)
    }
}

#[async_trait::async_trait]
impl ReservationStore for InMemoryBookingStore {
    async fn book(
        &self,
        slot: SlotKey,
        details: NewAppointment,
        now: DateTime<Utc>,
    ) -> Result<Appointment, ReservationError> {
        let mut state = self.state.lock().await;
        if !state.is_open(&slot) {
            return Err(state.unavailable(slot).into());
        }

        let appointment = Appointment::create(slot, details, now);
        state.set_open(&slot, false);
        state.appointments.insert(appointment.id.clone(), appointment.clone());
        Ok(appointment)
    }

    async fn cancel(
        &self,
        id: &AppointmentId,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, ReservationError> {
        let mut state = self.state.lock().await;
        let appointment = state
            .appointments
            .get_mut(id)
            .ok_or_else(|| BookingRejection::AppointmentNotFound(id.clone()))?;
        if appointment.transition_to(AppointmentStatus::Canceled, now).is_err() {
            return Ok(CancelOutcome::AlreadyCanceled(appointment.clone()));
        }

        let canceled = appointment.clone();
        state.set_open(&canceled.slot, true);
        Ok(CancelOutcome::Canceled(canceled))
    }

    async fn reschedule(
        &self,
        id: &AppointmentId,
        target: SlotKey,
        now: DateTime<Utc>,
    ) -> Result<Rescheduled, ReservationError> {
        let mut state = self.state.lock().await;
        let current = state
            .appointments
            .get(id)
            .ok_or_else(|| BookingRejection::AppointmentNotFound(id.clone()))?;
        if !current.is_active() {
            return Err(BookingRejection::AppointmentNotActive(id.clone()).into());
        }
        if !state.is_open(&target) {
            return Err(state.unavailable(target).into());
        }

        let mut appointment = current.clone();
        let previous = appointment.slot;
        appointment
            .reschedule(target, now)
            .map_err(|_| BookingRejection::AppointmentNotActive(id.clone()))?;

        state.set_open(&previous, true);
        state.set_open(&target, false);
        state.appointments.insert(id.clone(), appointment.clone());
        Ok(Rescheduled { appointment, previous })
    }
}
