//! Booking engine - the stateful services that sit between the chat layer and storage
//!
//! - **Reservations** (`reservation`) - book, cancel and move appointments while keeping
//!   at most one active appointment per slot, and send the resulting admin/client notices
//! - **Conversations** (`conversation`) - one booking dialog per user, driving the pure
//!   `BookingFlow` state machine and performing the effects it asks for
//! - **Reminders** (`reminders`) - the background sweep that sends day-before and
//!   hour-before reminders exactly once per appointment slot
//!
//! # Architecture
//!
//! ```text
//! chat update → ConversationEngine → ReservationEngine → ReservationStore (SQL or memory)
//!                                            ↓
//!                                         Notifier ← ReminderScheduler (interval sweep)
//! ```

use std::sync::Arc;

use lashbook_db::{
    AppointmentRepository, DbPool, InMemoryBookingStore, ReservationStore, SlotRepository,
    SqlAppointmentRepository, SqlReservationStore, SqlSlotRepository,
};

pub mod conversation;
pub mod notices;
pub mod reminders;
pub mod reservation;

pub use conversation::{ConversationEngine, ConversationReply};
pub use reminders::{LastSweep, ReminderScheduler, SweepReport};
pub use reservation::ReservationEngine;

/// The three storage seams, backed either by one SQLite pool or by one shared in-memory store.
#[derive(Clone)]
pub struct Storage {
    pub reservations: Arc<dyn ReservationStore>,
    pub slots: Arc<dyn SlotRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
}

impl Storage {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            reservations: Arc::new(SqlReservationStore::new(pool.clone())),
            slots: Arc::new(SqlSlotRepository::new(pool.clone())),
            appointments: Arc::new(SqlAppointmentRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryBookingStore::default());
        Self { reservations: store.clone(), slots: store.clone(), appointments: store }
    }
}
