pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use repositories::{
    AppointmentRepository, InMemoryBookingStore, RepositoryError, ReservationError,
    ReservationStore, SlotRemoval, SlotRepository, SqlAppointmentRepository, SqlReservationStore,
    SqlSlotRepository,
};
