use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{info, warn};

use lashbook_core::clock::Clock;
use lashbook_core::domain::appointment::{Appointment, AppointmentId, AppointmentStatus};
use lashbook_core::domain::booking::{BookingRequest, CancelOutcome, Rescheduled};
use lashbook_core::domain::slot::SlotKey;
use lashbook_core::errors::BookingRejection;
use lashbook_core::identity::{AdminDirectory, Identity, UserId};
use lashbook_core::notify::Notifier;
use lashbook_db::{RepositoryError, ReservationError};

use crate::notices;
use crate::Storage;

/// Book, cancel and move appointments on top of the atomic [`lashbook_db::ReservationStore`].
///
/// The store owns the one-active-appointment-per-slot invariant. This layer adds ownership
/// checks and the notices that follow each committed change. Notice delivery never fails an
/// operation that has already been committed.
pub struct ReservationEngine {
    storage: Storage,
    notifier: Arc<dyn Notifier>,
    admins: Arc<dyn AdminDirectory>,
    clock: Arc<dyn Clock>,
}

impl ReservationEngine {
    pub fn new(
        storage: Storage,
        notifier: Arc<dyn Notifier>,
        admins: Arc<dyn AdminDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { storage, notifier, admins, clock }
    }

    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.admins.is_admin(identity)
    }

    pub async fn book(
        &self,
        owner: &Identity,
        request: BookingRequest,
    ) -> Result<Appointment, ReservationError> {
        let (slot, details) = request.into_new_appointment(owner);
        let result = self.storage.reservations.book(slot, details, self.utc_now()).await;

        let appointment = match result {
            Ok(appointment) => appointment,
            Err(error) => {
                info!(
                    event_name = "reservation.book.rejected",
                    correlation_id = %owner.user_id,
                    slot = %slot,
                    error = %error,
                    "booking was not committed"
                );
                return Err(error);
            }
        };

        info!(
            event_name = "reservation.book.committed",
            correlation_id = %appointment.id,
            owner_id = %appointment.owner,
            slot = %appointment.slot,
            service = appointment.selection.service.as_str(),
            "appointment booked"
        );
        self.notify_admins(&appointment.id, &notices::admin_booked(&appointment)).await;

        Ok(appointment)
    }

    /// Cancels an appointment the actor owns, or any appointment when the actor is an admin.
    pub async fn cancel(
        &self,
        actor: &Identity,
        id: &AppointmentId,
    ) -> Result<CancelOutcome, ReservationError> {
        let acting_as_admin = self.authorize(actor, id).await?;
        let outcome = self.storage.reservations.cancel(id, self.utc_now()).await?;
        let appointment = outcome.appointment();

        if !outcome.transitioned() {
            info!(
                event_name = "reservation.cancel.noop",
                correlation_id = %id,
                "appointment was already canceled"
            );
            return Ok(outcome);
        }

        info!(
            event_name = "reservation.cancel.committed",
            correlation_id = %id,
            actor_id = %actor.user_id,
            slot = %appointment.slot,
            "appointment canceled and slot reopened"
        );
        if acting_as_admin && appointment.owner != actor.user_id {
            self.deliver(&appointment.owner, id, &notices::client_canceled(appointment)).await;
        } else {
            self.notify_admins(id, &notices::admin_canceled(appointment)).await;
        }

        Ok(outcome)
    }

    /// Moves an active appointment to an open slot and clears its reminder flags.
    pub async fn reschedule(
        &self,
        actor: &Identity,
        id: &AppointmentId,
        target: SlotKey,
    ) -> Result<Rescheduled, ReservationError> {
        let acting_as_admin = self.authorize(actor, id).await?;
        let moved = self.storage.reservations.reschedule(id, target, self.utc_now()).await?;
        let appointment = &moved.appointment;

        info!(
            event_name = "reservation.move.committed",
            correlation_id = %id,
            actor_id = %actor.user_id,
            from_slot = %moved.previous,
            to_slot = %appointment.slot,
            "appointment moved"
        );
        if acting_as_admin && appointment.owner != actor.user_id {
            let text = notices::client_moved(appointment, &moved.previous);
            self.deliver(&appointment.owner, id, &text).await;
        } else {
            self.notify_admins(id, &notices::admin_moved(appointment, &moved.previous)).await;
        }

        Ok(moved)
    }

    /// Open times of one day, earliest first. A day without open slots is an empty list.
    pub async fn list_open_slots(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, RepositoryError> {
        let slots = self.storage.slots.list_for_date(date, true).await?;
        let mut times: Vec<NaiveTime> = slots.into_iter().map(|slot| slot.key.time).collect();
        times.sort();
        Ok(times)
    }

    /// The caller's active appointments that have not started yet, earliest first.
    pub async fn appointments_for_owner(
        &self,
        owner: &Identity,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let now = self.clock.now();
        let mut upcoming =
            self.storage.appointments.list_for_owner(&owner.user_id, now.date_naive()).await?;
        upcoming.retain(|appointment| appointment.slot.starts_at(*now.offset()) > now);
        Ok(upcoming)
    }

    /// Admin day view: every active appointment on `date`.
    pub async fn appointments_for_date(
        &self,
        actor: &Identity,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, ReservationError> {
        if !self.is_admin(actor) {
            return Err(BookingRejection::AdminOnly("day view").into());
        }
        Ok(self.storage.appointments.list_for_date(date, Some(AppointmentStatus::Active)).await?)
    }

    /// Returns whether the actor acts with admin rights.
    async fn authorize(
        &self,
        actor: &Identity,
        id: &AppointmentId,
    ) -> Result<bool, ReservationError> {
        let appointment = self
            .storage
            .appointments
            .find_by_id(id)
            .await?
            .ok_or_else(|| BookingRejection::AppointmentNotFound(id.clone()))?;

        if self.is_admin(actor) {
            return Ok(true);
        }
        if appointment.owner != actor.user_id {
            warn!(
                event_name = "reservation.access.denied",
                correlation_id = %id,
                actor_id = %actor.user_id,
                "client tried to act on another client's appointment"
            );
            return Err(BookingRejection::NotPermitted(id.clone()).into());
        }
        Ok(false)
    }

    async fn notify_admins(&self, correlation_id: &AppointmentId, text: &str) {
        for recipient in self.admins.notice_recipients() {
            self.deliver(&recipient, correlation_id, text).await;
        }
    }

    async fn deliver(&self, recipient: &UserId, correlation_id: &AppointmentId, text: &str) {
        if let Err(error) = self.notifier.send(recipient, text).await {
            warn!(
                event_name = "reservation.notice.delivery_failed",
                correlation_id = %correlation_id,
                recipient = %recipient,
                error = %error,
                "notice could not be delivered"
            );
        }
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone};

    use lashbook_core::clock::{Clock, ManualClock};
    use lashbook_core::domain::appointment::{ContactDetails, ReminderKind};
    use lashbook_core::domain::booking::BookingRequest;
    use lashbook_core::domain::service::{Service, ServiceSelection};
    use lashbook_core::domain::slot::SlotKey;
    use lashbook_core::errors::BookingRejection;
    use lashbook_core::identity::{Identity, StaticAdminDirectory, UserId};
    use lashbook_core::notify::{NotifyError, RecordingNotifier};
    use lashbook_db::ReservationError;

    use super::ReservationEngine;
    use crate::Storage;

    const ADMIN_CHAT: &str = "9000";

    struct Harness {
        engine: Arc<ReservationEngine>,
        storage: Storage,
        notifier: RecordingNotifier,
    }

    async fn harness(open_slots: &[SlotKey]) -> Harness {
        let zone = FixedOffset::east_opt(7200).expect("offset");
        let clock: Arc<dyn Clock> =
            Arc::new(ManualClock::new(zone.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()));
        let storage = Storage::in_memory();
        for slot in open_slots {
            storage.slots.insert_slot(*slot, clock.now().into()).await.expect("seed slot");
        }
        let notifier = RecordingNotifier::default();
        let engine = Arc::new(ReservationEngine::new(
            storage.clone(),
            Arc::new(notifier.clone()),
            Arc::new(StaticAdminDirectory::new(["studio_owner"], [ADMIN_CHAT])),
            clock,
        ));
        Harness { engine, storage, notifier }
    }

    fn slot(day: u32, hour: u32) -> SlotKey {
        SlotKey::new(
            NaiveDate::from_ymd_opt(2026, 3, day).expect("date"),
            NaiveTime::from_hms_opt(hour, 0, 0).expect("time"),
        )
    }

    fn client(id: &str) -> Identity {
        Identity::new(id, Some(format!("client_{id}").as_str()))
    }

    fn admin() -> Identity {
        Identity::new("1", Some("@studio_owner"))
    }

    fn request(slot: SlotKey, name: &str) -> BookingRequest {
        BookingRequest {
            slot,
            contact: ContactDetails { name: name.to_owned(), phone: "+380991234567".to_owned() },
            selection: ServiceSelection { service: Service::Lamination, style: None },
        }
    }

    fn admin_chat() -> UserId {
        UserId(ADMIN_CHAT.to_owned())
    }

    #[tokio::test]
    async fn booking_closes_the_slot_and_notifies_admins() {
        let h = harness(&[slot(5, 10), slot(5, 12)]).await;

        let appointment =
            h.engine.book(&client("42"), request(slot(5, 10), "Maria K")).await.expect("book");

        assert_eq!(appointment.owner, UserId("42".to_owned()));
        assert_eq!(appointment.owner_handle.as_deref(), Some("client_42"));
        assert_eq!(
            h.engine.list_open_slots(slot(5, 10).date).await.expect("open"),
            vec![slot(5, 12).time]
        );
        let notices = h.notifier.sent_to(&admin_chat());
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("Maria K"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bookings_of_one_slot_yield_exactly_one_winner() {
        let h = harness(&[slot(5, 10)]).await;

        let mut handles = Vec::new();
        for idx in 0..16 {
            let engine = h.engine.clone();
            handles.push(tokio::spawn(async move {
                let owner = client(&format!("{}", 100 + idx));
                engine.book(&owner, request(slot(5, 10), &format!("Client {idx}"))).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(_) => winners += 1,
                Err(ReservationError::Rejected(BookingRejection::SlotTaken(taken))) => {
                    assert_eq!(taken, slot(5, 10));
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners, 1);
        let active = h
            .engine
            .appointments_for_date(&admin(), slot(5, 10).date)
            .await
            .expect("day view");
        assert_eq!(active.len(), 1);
        assert!(h.engine.list_open_slots(slot(5, 10).date).await.expect("open").is_empty());
        assert_eq!(h.notifier.sent_to(&admin_chat()).len(), 1);
    }

    #[tokio::test]
    async fn booking_a_missing_slot_is_rejected_without_notices() {
        let h = harness(&[]).await;

        let error = h
            .engine
            .book(&client("42"), request(slot(5, 10), "Maria K"))
            .await
            .expect_err("no such slot");

        assert!(matches!(
            error,
            ReservationError::Rejected(BookingRejection::SlotNotFound(missing))
                if missing == slot(5, 10)
        ));
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn client_cancel_reopens_slot_and_second_cancel_is_a_noop() {
        let h = harness(&[slot(5, 10)]).await;
        let owner = client("42");
        let appointment =
            h.engine.book(&owner, request(slot(5, 10), "Maria K")).await.expect("book");

        let first = h.engine.cancel(&owner, &appointment.id).await.expect("cancel");
        let second = h.engine.cancel(&owner, &appointment.id).await.expect("cancel again");

        assert!(first.transitioned());
        assert!(!second.transitioned());
        assert_eq!(
            h.engine.list_open_slots(slot(5, 10).date).await.expect("open"),
            vec![slot(5, 10).time]
        );
        // One booking notice and one cancel notice.
        assert_eq!(h.notifier.sent_to(&admin_chat()).len(), 2);
    }

    #[tokio::test]
    async fn clients_cannot_cancel_someone_elses_appointment() {
        let h = harness(&[slot(5, 10)]).await;
        let appointment =
            h.engine.book(&client("42"), request(slot(5, 10), "Maria K")).await.expect("book");

        let error = h.engine.cancel(&client("77"), &appointment.id).await.expect_err("denied");

        assert!(matches!(
            error,
            ReservationError::Rejected(BookingRejection::NotPermitted(ref id))
                if id == &appointment.id
        ));
        let stored = h
            .storage
            .appointments
            .find_by_id(&appointment.id)
            .await
            .expect("load")
            .expect("exists");
        assert!(stored.is_active());
    }

    #[tokio::test]
    async fn unknown_appointments_are_reported() {
        let h = harness(&[]).await;
        let missing = lashbook_core::domain::appointment::AppointmentId("nope".to_owned());

        let error = h.engine.cancel(&admin(), &missing).await.expect_err("missing");

        assert!(matches!(
            error,
            ReservationError::Rejected(BookingRejection::AppointmentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn admin_cancel_notifies_the_client() {
        let h = harness(&[slot(5, 10)]).await;
        let appointment =
            h.engine.book(&client("42"), request(slot(5, 10), "Maria K")).await.expect("book");

        h.engine.cancel(&admin(), &appointment.id).await.expect("admin cancel");

        let client_notices = h.notifier.sent_to(&UserId("42".to_owned()));
        assert_eq!(client_notices.len(), 1);
        assert!(client_notices[0].contains("canceled by the studio"));
        assert_eq!(h.notifier.sent_to(&admin_chat()).len(), 1, "only the booking notice");
    }

    #[tokio::test]
    async fn admin_move_repoints_resets_reminders_and_notifies_client() {
        let h = harness(&[slot(5, 10), slot(6, 15)]).await;
        let appointment =
            h.engine.book(&client("42"), request(slot(5, 10), "Maria K")).await.expect("book");
        h.storage
            .appointments
            .mark_reminder_sent(
                &appointment.id,
                &appointment.slot,
                ReminderKind::DayBefore,
                appointment.created_at,
            )
            .await
            .expect("mark");

        let moved =
            h.engine.reschedule(&admin(), &appointment.id, slot(6, 15)).await.expect("move");

        assert_eq!(moved.previous, slot(5, 10));
        assert_eq!(moved.appointment.slot, slot(6, 15));
        assert!(!moved.appointment.reminders.day_sent);
        assert!(!moved.appointment.reminders.hour_sent);
        assert_eq!(
            h.engine.list_open_slots(slot(5, 10).date).await.expect("open"),
            vec![slot(5, 10).time]
        );
        assert!(h.engine.list_open_slots(slot(6, 15).date).await.expect("open").is_empty());
        let client_notices = h.notifier.sent_to(&UserId("42".to_owned()));
        assert_eq!(client_notices.len(), 1);
        assert!(client_notices[0].contains("2026-03-06 15:00"));
    }

    #[tokio::test]
    async fn move_onto_a_taken_slot_changes_nothing() {
        let h = harness(&[slot(5, 10), slot(5, 12)]).await;
        let first =
            h.engine.book(&client("42"), request(slot(5, 10), "Maria K")).await.expect("book");
        h.engine.book(&client("77"), request(slot(5, 12), "Olena P")).await.expect("book");

        let error = h
            .engine
            .reschedule(&client("42"), &first.id, slot(5, 12))
            .await
            .expect_err("target taken");

        assert!(matches!(error, ReservationError::Rejected(BookingRejection::SlotTaken(_))));
        let stored =
            h.storage.appointments.find_by_id(&first.id).await.expect("load").expect("exists");
        assert_eq!(stored, first);
        assert!(h.engine.list_open_slots(slot(5, 10).date).await.expect("open").is_empty());
    }

    #[tokio::test]
    async fn canceled_slot_can_be_booked_again() {
        let h = harness(&[slot(5, 10)]).await;
        let first =
            h.engine.book(&client("42"), request(slot(5, 10), "Maria K")).await.expect("book");
        h.engine.cancel(&client("42"), &first.id).await.expect("cancel");

        let second =
            h.engine.book(&client("77"), request(slot(5, 10), "Olena P")).await.expect("rebook");

        assert_ne!(first.id, second.id);
        assert_eq!(second.contact.name, "Olena P");
    }

    #[tokio::test]
    async fn notice_failures_do_not_undo_a_booking() {
        let h = harness(&[slot(5, 10)]).await;
        h.notifier.fail_next(1, NotifyError::Unreachable(admin_chat()));

        let appointment =
            h.engine.book(&client("42"), request(slot(5, 10), "Maria K")).await.expect("book");

        assert!(appointment.is_active());
        assert_eq!(h.notifier.attempts(), 1);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn day_view_is_admin_only() {
        let h = harness(&[slot(5, 10)]).await;

        let error = h
            .engine
            .appointments_for_date(&client("42"), slot(5, 10).date)
            .await
            .expect_err("not an admin");

        assert!(matches!(error, ReservationError::Rejected(BookingRejection::AdminOnly(_))));
    }

    #[tokio::test]
    async fn my_bookings_lists_only_own_upcoming_appointments() {
        let h = harness(&[slot(5, 10), slot(6, 12), slot(7, 9)]).await;
        let owner = client("42");
        h.engine.book(&owner, request(slot(6, 12), "Maria K")).await.expect("book");
        h.engine.book(&owner, request(slot(5, 10), "Maria K")).await.expect("book");
        h.engine.book(&client("77"), request(slot(7, 9), "Olena P")).await.expect("book");

        let mine = h.engine.appointments_for_owner(&owner).await.expect("list");

        let slots: Vec<SlotKey> = mine.iter().map(|appointment| appointment.slot).collect();
        assert_eq!(slots, vec![slot(5, 10), slot(6, 12)]);
    }

    #[tokio::test]
    async fn my_bookings_skip_appointments_that_already_started_today() {
        let h = harness(&[slot(1, 8), slot(1, 9), slot(1, 11)]).await;
        let owner = client("42");
        for key in [slot(1, 8), slot(1, 9), slot(1, 11)] {
            h.engine.book(&owner, request(key, "Maria K")).await.expect("book");
        }

        let mine = h.engine.appointments_for_owner(&owner).await.expect("list");

        let slots: Vec<SlotKey> = mine.iter().map(|appointment| appointment.slot).collect();
        assert_eq!(slots, vec![slot(1, 11)]);
    }

    #[tokio::test]
    async fn empty_day_lists_no_open_times() {
        let h = harness(&[slot(5, 10)]).await;

        let times = h
            .engine
            .list_open_slots(NaiveDate::from_ymd_opt(2026, 3, 9).expect("date"))
            .await
            .expect("open");

        assert!(times.is_empty());
    }
}
