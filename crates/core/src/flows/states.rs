use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::appointment::{AppointmentId, ContactDetails};
use crate::domain::booking::BookingRequest;
use crate::domain::service::{ExtensionStyle, Service, ServiceSelection};
use crate::domain::slot::SlotKey;
use crate::errors::BookingRejection;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStage {
    #[default]
    Idle,
    ChoosingService,
    ChoosingStyle,
    ChoosingDate,
    ChoosingTime,
    CollectingName,
    CollectingPhone,
    AwaitingConfirmation,
}

/// Per-user progress through the booking dialog. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSession {
    pub stage: BookingStage,
    pub service: Option<Service>,
    pub style: Option<ExtensionStyle>,
    pub date: Option<NaiveDate>,
    pub offered_times: Vec<NaiveTime>,
    pub time: Option<NaiveTime>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl BookingSession {
    pub fn at(stage: BookingStage) -> Self {
        Self { stage, ..Self::default() }
    }

    pub fn selection(&self) -> Option<ServiceSelection> {
        let service = self.service?;
        if service.requires_style() && self.style.is_none() {
            return None;
        }
        Some(ServiceSelection { service, style: self.style })
    }

    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.selection().is_none() {
            missing.push("service".to_owned());
        }
        if self.date.is_none() {
            missing.push("date".to_owned());
        }
        if self.time.is_none() {
            missing.push("time".to_owned());
        }
        if self.name.is_none() {
            missing.push("name".to_owned());
        }
        if self.phone.is_none() {
            missing.push("phone".to_owned());
        }
        missing
    }

    /// The request as collected so far, if every field is present.
    pub fn request(&self) -> Option<BookingRequest> {
        Some(BookingRequest {
            slot: SlotKey::new(self.date?, self.time?),
            contact: ContactDetails { name: self.name.clone()?, phone: self.phone.clone()? },
            selection: self.selection()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowEvent {
    Start,
    Restart,
    ServiceSelected(Service),
    StyleSelected(ExtensionStyle),
    DateChosen(NaiveDate),
    OpenTimesLoaded { date: NaiveDate, times: Vec<NaiveTime> },
    TimeChosen(NaiveTime),
    /// Free text typed by the user; interpreted according to the current stage.
    TextEntered(String),
    Confirmed,
    Declined,
    BookingSucceeded { appointment_id: AppointmentId, slot: SlotKey },
    BookingRejected(BookingRejection),
    BookingFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowContext {
    pub today: NaiveDate,
    pub horizon_days: u32,
}

/// What the user should be shown next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prompt {
    MainMenu,
    ChooseService,
    ChooseStyle,
    ChooseDate,
    InvalidDate,
    NoAvailability { date: NaiveDate },
    ChooseTime { date: NaiveDate, times: Vec<NaiveTime> },
    InvalidTime { date: NaiveDate, times: Vec<NaiveTime> },
    EnterName,
    InvalidName,
    EnterPhone,
    InvalidPhone,
    Confirm(BookingRequest),
    Booked { appointment_id: AppointmentId, slot: SlotKey },
    SlotLost { slot: SlotKey },
    Discarded,
    StartOver,
    TryAgainLater,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowAction {
    Reply(Prompt),
    LoadOpenTimes { date: NaiveDate },
    SubmitBooking(BookingRequest),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: BookingStage,
    pub to: BookingStage,
    pub session: BookingSession,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
