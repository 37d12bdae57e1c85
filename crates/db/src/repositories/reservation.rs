use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use lashbook_core::domain::appointment::{
    Appointment, AppointmentId, AppointmentStatus, NewAppointment,
};
use lashbook_core::domain::booking::{CancelOutcome, Rescheduled};
use lashbook_core::domain::slot::SlotKey;
use lashbook_core::errors::BookingRejection;

use super::appointment::{insert_appointment, load_appointment};
use super::{ReservationError, ReservationStore};
use crate::DbPool;

/// SQL reservation store.
///
/// Every operation opens a transaction whose first statement is a conditional write on the
/// slot or appointment row. SQLite takes the write lock at that statement, so concurrent
/// callers serialize on it and the loser observes the winner's committed state.
pub struct SqlReservationStore {
    pool: DbPool,
}

impl SqlReservationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReservationStore for SqlReservationStore {
    async fn book(
        &self,
        slot: SlotKey,
        details: NewAppointment,
        now: DateTime<Utc>,
    ) -> Result<Appointment, ReservationError> {
        let mut tx = self.pool.begin().await?;

        if !claim_slot(&mut tx, &slot).await? {
            let rejection = unavailable(&mut tx, slot).await?;
            return Err(rejection.into());
        }

        let appointment = Appointment::create(slot, details, now);
        insert_appointment(&mut tx, &appointment).await?;
        tx.commit().await?;

        Ok(appointment)
    }

    async fn cancel(
        &self,
        id: &AppointmentId,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, ReservationError> {
        let mut tx = self.pool.begin().await?;

        let canceled = sqlx::query(
            "UPDATE appointment SET status = ?, updated_at = ?
             WHERE id = ? AND status = 'active'",
        )
        .bind(AppointmentStatus::Canceled.as_str())
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let appointment = load_appointment(&mut tx, id)
            .await?
            .ok_or_else(|| BookingRejection::AppointmentNotFound(id.clone()))?;
        if canceled == 0 {
            return Ok(CancelOutcome::AlreadyCanceled(appointment));
        }

        set_open(&mut tx, &appointment.slot, true).await?;
        tx.commit().await?;

        Ok(CancelOutcome::Canceled(appointment))
    }

    async fn reschedule(
        &self,
        id: &AppointmentId,
        target: SlotKey,
        now: DateTime<Utc>,
    ) -> Result<Rescheduled, ReservationError> {
        let mut tx = self.pool.begin().await?;

        let claimed = claim_slot(&mut tx, &target).await?;

        let mut appointment = load_appointment(&mut tx, id)
            .await?
            .ok_or_else(|| BookingRejection::AppointmentNotFound(id.clone()))?;
        if !appointment.is_active() {
            return Err(BookingRejection::AppointmentNotActive(id.clone()).into());
        }
        if !claimed {
            let rejection = unavailable(&mut tx, target).await?;
            return Err(rejection.into());
        }

        let previous = appointment.slot;
        appointment
            .reschedule(target, now)
            .map_err(|_| BookingRejection::AppointmentNotActive(id.clone()))?;

        set_open(&mut tx, &previous, true).await?;
        sqlx::query(
            "UPDATE appointment
             SET slot_date = ?, slot_time = ?, day_reminder_sent = 0, hour_reminder_sent = 0,
                 updated_at = ?
             WHERE id = ? AND status = 'active'",
        )
        .bind(target.date_str())
        .bind(target.time_str())
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Rescheduled { appointment, previous })
    }
}

async fn claim_slot(conn: &mut SqliteConnection, slot: &SlotKey) -> Result<bool, sqlx::Error> {
    let claimed = sqlx::query(
        "UPDATE slot SET is_open = 0 WHERE slot_date = ? AND slot_time = ? AND is_open = 1",
    )
    .bind(slot.date_str())
    .bind(slot.time_str())
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(claimed == 1)
}

async fn set_open(
    conn: &mut SqliteConnection,
    slot: &SlotKey,
    is_open: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE slot SET is_open = ? WHERE slot_date = ? AND slot_time = ?")
        .bind(is_open)
        .bind(slot.date_str())
        .bind(slot.time_str())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn unavailable(
    conn: &mut SqliteConnection,
    slot: SlotKey,
) -> Result<BookingRejection, sqlx::Error> {
    let exists = sqlx::query("SELECT 1 FROM slot WHERE slot_date = ? AND slot_time = ?")
        .bind(slot.date_str())
        .bind(slot.time_str())
        .fetch_optional(&mut *conn)
        .await?
        .is_some();

    if exists {
        Ok(BookingRejection::SlotTaken(slot))
    } else {
        Ok(BookingRejection::SlotNotFound(slot))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime, Utc};
    use tempfile::TempDir;

    use lashbook_core::domain::appointment::{
        AppointmentStatus, ContactDetails, NewAppointment, ReminderKind,
    };
    use lashbook_core::domain::booking::CancelOutcome;
    use lashbook_core::domain::service::{Service, ServiceSelection};
    use lashbook_core::domain::slot::SlotKey;
    use lashbook_core::errors::BookingRejection;
    use lashbook_core::identity::UserId;

    use super::SqlReservationStore;
    use crate::repositories::{
        AppointmentRepository, ReservationError, ReservationStore, SlotRepository,
        SqlAppointmentRepository, SqlSlotRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn key(hour: u32) -> SlotKey {
        SlotKey::new(
            NaiveDate::from_ymd_opt(2026, 3, 5).expect("date"),
            NaiveTime::from_hms_opt(hour, 0, 0).expect("time"),
        )
    }

    fn details(owner: &str, name: &str) -> NewAppointment {
        NewAppointment {
            owner: UserId(owner.to_owned()),
            owner_handle: None,
            contact: ContactDetails { name: name.to_owned(), phone: "+380991234567".to_owned() },
            selection: ServiceSelection { service: Service::Lamination, style: None },
        }
    }

    async fn seed(pool: &DbPool, hours: &[u32]) {
        let slots = SqlSlotRepository::new(pool.clone());
        for hour in hours {
            slots.insert_slot(key(*hour), Utc::now()).await.expect("insert slot");
        }
    }

    async fn is_open(pool: &DbPool, hour: u32) -> bool {
        SqlSlotRepository::new(pool.clone())
            .find_slot(&key(hour))
            .await
            .expect("find slot")
            .expect("slot exists")
            .is_open
    }

    fn rejection(error: ReservationError) -> BookingRejection {
        match error {
            ReservationError::Rejected(rejection) => rejection,
            ReservationError::Repository(error) => panic!("unexpected repository error: {error}"),
        }
    }

    #[tokio::test]
    async fn booking_closes_the_slot_and_rejects_the_second_caller() {
        let pool = setup_pool().await;
        seed(&pool, &[10]).await;
        let store = SqlReservationStore::new(pool.clone());

        store.book(key(10), details("1", "Maria K"), Utc::now()).await.expect("first booking");
        let error = store
            .book(key(10), details("2", "Olena P"), Utc::now())
            .await
            .expect_err("second booking");

        assert_eq!(rejection(error), BookingRejection::SlotTaken(key(10)));
        assert!(!is_open(&pool, 10).await);
    }

    #[tokio::test]
    async fn booking_an_unknown_slot_is_rejected() {
        let store = SqlReservationStore::new(setup_pool().await);
        let error = store
            .book(key(18), details("1", "Maria K"), Utc::now())
            .await
            .expect_err("no such slot");

        assert_eq!(rejection(error), BookingRejection::SlotNotFound(key(18)));
    }

    #[tokio::test]
    async fn cancel_reopens_once_and_the_slot_is_reusable() {
        let pool = setup_pool().await;
        seed(&pool, &[10]).await;
        let store = SqlReservationStore::new(pool.clone());
        let booked = store.book(key(10), details("1", "Maria K"), Utc::now()).await.expect("book");

        let first = store.cancel(&booked.id, Utc::now()).await.expect("cancel");
        let second = store.cancel(&booked.id, Utc::now()).await.expect("cancel again");

        assert!(matches!(first, CancelOutcome::Canceled(_)));
        assert!(matches!(second, CancelOutcome::AlreadyCanceled(ref a)
            if a.status == AppointmentStatus::Canceled));
        assert!(is_open(&pool, 10).await);

        let rebooked =
            store.book(key(10), details("2", "Olena P"), Utc::now()).await.expect("rebook");
        assert_eq!(rebooked.contact.name, "Olena P");
        assert!(!is_open(&pool, 10).await);
    }

    #[tokio::test]
    async fn canceling_an_unknown_appointment_is_not_found() {
        let store = SqlReservationStore::new(setup_pool().await);
        let missing = lashbook_core::domain::appointment::AppointmentId("missing".to_owned());

        let error = store.cancel(&missing, Utc::now()).await.expect_err("not found");
        assert_eq!(rejection(error), BookingRejection::AppointmentNotFound(missing));
    }

    #[tokio::test]
    async fn move_swaps_slots_and_resets_reminders() {
        let pool = setup_pool().await;
        seed(&pool, &[10, 12]).await;
        let store = SqlReservationStore::new(pool.clone());
        let repo = SqlAppointmentRepository::new(pool.clone());
        let booked = store.book(key(10), details("1", "Maria K"), Utc::now()).await.expect("book");
        repo.mark_reminder_sent(&booked.id, &key(10), ReminderKind::DayBefore, Utc::now())
            .await
            .expect("mark");

        let moved = store.reschedule(&booked.id, key(12), Utc::now()).await.expect("move");

        assert_eq!(moved.previous, key(10));
        assert_eq!(moved.appointment.slot, key(12));
        assert!(is_open(&pool, 10).await);
        assert!(!is_open(&pool, 12).await);
        let stored = repo.find_by_id(&booked.id).await.expect("find").expect("exists");
        assert_eq!(stored.slot, key(12));
        assert!(!stored.reminders.day_sent);
        assert!(!stored.reminders.hour_sent);
    }

    #[tokio::test]
    async fn move_to_a_taken_slot_changes_nothing() {
        let pool = setup_pool().await;
        seed(&pool, &[10, 12]).await;
        let store = SqlReservationStore::new(pool.clone());
        let repo = SqlAppointmentRepository::new(pool.clone());
        let mine = store.book(key(10), details("1", "Maria K"), Utc::now()).await.expect("book");
        store.book(key(12), details("2", "Olena P"), Utc::now()).await.expect("book other");
        repo.mark_reminder_sent(&mine.id, &key(10), ReminderKind::DayBefore, Utc::now())
            .await
            .expect("mark");
        let before = repo.find_by_id(&mine.id).await.expect("find").expect("exists");

        let error =
            store.reschedule(&mine.id, key(12), Utc::now()).await.expect_err("target taken");
        let onto_itself =
            store.reschedule(&mine.id, key(10), Utc::now()).await.expect_err("own slot");

        assert_eq!(rejection(error), BookingRejection::SlotTaken(key(12)));
        assert_eq!(rejection(onto_itself), BookingRejection::SlotTaken(key(10)));
        assert_eq!(repo.find_by_id(&mine.id).await.expect("find"), Some(before));
        assert!(!is_open(&pool, 10).await);
        assert!(!is_open(&pool, 12).await);
    }

    #[tokio::test]
    async fn moving_a_canceled_appointment_leaves_the_target_open() {
        let pool = setup_pool().await;
        seed(&pool, &[10, 12]).await;
        let store = SqlReservationStore::new(pool.clone());
        let booked = store.book(key(10), details("1", "Maria K"), Utc::now()).await.expect("book");
        store.cancel(&booked.id, Utc::now()).await.expect("cancel");

        let error = store.reschedule(&booked.id, key(12), Utc::now()).await.expect_err("inactive");

        assert_eq!(rejection(error), BookingRejection::AppointmentNotActive(booked.id));
        assert!(is_open(&pool, 12).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bookings_on_one_slot_have_a_single_winner() {
        let dir = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("race.db").display());
        let pool = connect_with_settings(&url, 8, 30).await.expect("connect file db");
        migrations::run_pending(&pool).await.expect("run migrations");
        seed(&pool, &[10]).await;
        let store = Arc::new(SqlReservationStore::new(pool.clone()));

        let handles = (0..8)
            .map(|idx| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.book(key(10), details(&idx.to_string(), "Client"), Utc::now()).await
                })
            })
            .collect::<Vec<_>>();

        let mut winners = 0;
        for handle in handles {
            match handle.await.expect("join") {
                Ok(_) => winners += 1,
                Err(error) => assert_eq!(rejection(error), BookingRejection::SlotTaken(key(10))),
            }
        }

        assert_eq!(winners, 1);
        assert!(!is_open(&pool, 10).await);
        let active = SqlAppointmentRepository::new(pool)
            .list_for_date(key(10).date, Some(AppointmentStatus::Active))
            .await
            .expect("day view");
        assert_eq!(active.len(), 1);
    }
}
