pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod identity;
pub mod notify;
pub mod reminders;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::appointment::{
    Appointment, AppointmentId, AppointmentStatus, ContactDetails, NewAppointment, ReminderFlags,
    ReminderKind,
};
pub use domain::booking::{BookingRequest, CancelOutcome, Rescheduled};
pub use domain::service::{ExtensionStyle, Service, ServiceSelection};
pub use domain::slot::{Slot, SlotKey};
pub use errors::{ApplicationError, BookingRejection, DomainError, InterfaceError};
pub use flows::{BookingFlow, BookingSession, BookingStage, FlowEvent, Prompt};
pub use identity::{AdminDirectory, Identity, StaticAdminDirectory, UserId};
pub use notify::{Notifier, NotifyError, RecordingNotifier};
pub use reminders::ReminderPolicy;
