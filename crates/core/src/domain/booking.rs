use serde::{Deserialize, Serialize};

use crate::domain::appointment::{Appointment, ContactDetails, NewAppointment};
use crate::domain::service::ServiceSelection;
use crate::domain::slot::SlotKey;
use crate::identity::Identity;

/// A fully collected booking, ready to be submitted for a slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub slot: SlotKey,
    pub contact: ContactDetails,
    pub selection: ServiceSelection,
}

impl BookingRequest {
    pub fn into_new_appointment(self, owner: &Identity) -> (SlotKey, NewAppointment) {
        (
            self.slot,
            NewAppointment {
                owner: owner.user_id.clone(),
                owner_handle: owner.handle.clone(),
                contact: self.contact,
                selection: self.selection,
            },
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    Canceled(Appointment),
    AlreadyCanceled(Appointment),
}

impl CancelOutcome {
    pub fn appointment(&self) -> &Appointment {
        match self {
            Self::Canceled(appointment) | Self::AlreadyCanceled(appointment) => appointment,
        }
    }

    pub fn transitioned(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rescheduled {
    pub appointment: Appointment,
    pub previous: SlotKey,
}
