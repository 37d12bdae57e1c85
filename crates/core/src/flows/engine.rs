use chrono::{Days, NaiveDate};
use thiserror::Error;

use crate::domain::slot::{parse_date, parse_time};
use crate::errors::BookingRejection;
use crate::flows::input::{
    normalize_phone, parse_confirmation, parse_service, parse_style, validate_name,
};
use crate::flows::states::{
    BookingSession, BookingStage, FlowAction, FlowContext, FlowEvent, Prompt, TransitionOutcome,
};

/// Pure transition function of the booking dialog.
///
/// Side effects are returned as [`FlowAction`]s for the caller to perform; the results of
/// those effects come back in as further events (`OpenTimesLoaded`, `BookingSucceeded`, ...).
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingFlow;

impl BookingFlow {
    pub fn initial_session(&self) -> BookingSession {
        BookingSession::default()
    }

    pub fn apply(
        &self,
        current: &BookingSession,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let (session, actions) = transition(current, event, context)?;
        Ok(TransitionOutcome {
            from: current.stage,
            to: session.stage,
            session,
            event: event.clone(),
            actions,
        })
    }

    /// The prompt that restates what the current stage is waiting for.
    pub fn reprompt(&self, session: &BookingSession) -> Prompt {
        match session.stage {
            BookingStage::Idle => Prompt::MainMenu,
            BookingStage::ChoosingService => Prompt::ChooseService,
            BookingStage::ChoosingStyle => Prompt::ChooseStyle,
            BookingStage::ChoosingDate => Prompt::ChooseDate,
            BookingStage::ChoosingTime => match session.date {
                Some(date) => Prompt::ChooseTime { date, times: session.offered_times.clone() },
                None => Prompt::ChooseDate,
            },
            BookingStage::CollectingName => Prompt::EnterName,
            BookingStage::CollectingPhone => Prompt::EnterPhone,
            BookingStage::AwaitingConfirmation => {
                session.request().map(Prompt::Confirm).unwrap_or(Prompt::StartOver)
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before transition from {stage:?}: {missing_fields:?}")]
    MissingRequiredFields { stage: BookingStage, missing_fields: Vec<String> },
    #[error("invalid transition from {stage:?} using event {event:?}")]
    InvalidTransition { stage: BookingStage, event: FlowEvent },
}

fn transition(
    current: &BookingSession,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<(BookingSession, Vec<FlowAction>), FlowTransitionError> {
    use BookingStage::{
        AwaitingConfirmation, ChoosingDate, ChoosingService, ChoosingStyle, ChoosingTime,
        CollectingName, CollectingPhone, Idle,
    };

    let outcome = match (current.stage, event) {
        (_, FlowEvent::Restart) => (BookingSession::default(), vec![reply(Prompt::MainMenu)]),
        (_, FlowEvent::Start) => {
            (BookingSession::at(ChoosingService), vec![reply(Prompt::ChooseService)])
        }
        (Idle, _) => (current.clone(), vec![reply(Prompt::StartOver)]),

        (CollectingName, FlowEvent::TextEntered(text)) => match validate_name(text) {
            Some(name) => {
                let mut next = current.clone();
                next.name = Some(name);
                next.stage = CollectingPhone;
                (next, vec![reply(Prompt::EnterPhone)])
            }
            None => (current.clone(), vec![reply(Prompt::InvalidName)]),
        },
        (CollectingPhone, FlowEvent::TextEntered(text)) => match normalize_phone(text) {
            Some(phone) => {
                let mut next = current.clone();
                next.phone = Some(phone);
                let request = next.request().ok_or_else(|| missing_fields(&next))?;
                next.stage = AwaitingConfirmation;
                (next, vec![reply(Prompt::Confirm(request))])
            }
            None => (current.clone(), vec![reply(Prompt::InvalidPhone)]),
        },
        (_, FlowEvent::TextEntered(text)) => match interpret(current, text) {
            Some(interpreted) => return transition(current, &interpreted, context),
            None => (current.clone(), vec![reply(unparsed_input_prompt(current))]),
        },

        (ChoosingService, FlowEvent::ServiceSelected(service)) => {
            let mut next = current.clone();
            next.service = Some(*service);
            next.style = None;
            if service.requires_style() {
                next.stage = ChoosingStyle;
                (next, vec![reply(Prompt::ChooseStyle)])
            } else {
                next.stage = ChoosingDate;
                (next, vec![reply(Prompt::ChooseDate)])
            }
        }
        (ChoosingStyle, FlowEvent::StyleSelected(style)) => {
            let mut next = current.clone();
            next.style = Some(*style);
            next.stage = ChoosingDate;
            (next, vec![reply(Prompt::ChooseDate)])
        }
        (ChoosingDate | ChoosingTime, FlowEvent::DateChosen(date)) => {
            if !within_horizon(*date, context) {
                return Ok((current.clone(), vec![reply(Prompt::InvalidDate)]));
            }
            let mut next = current.clone();
            next.stage = ChoosingDate;
            next.date = Some(*date);
            next.time = None;
            next.offered_times.clear();
            (next, vec![FlowAction::LoadOpenTimes { date: *date }])
        }
        (ChoosingDate, FlowEvent::OpenTimesLoaded { date, times })
            if current.date == Some(*date) =>
        {
            let mut next = current.clone();
            if times.is_empty() {
                next.offered_times.clear();
                (next, vec![reply(Prompt::NoAvailability { date: *date })])
            } else {
                next.stage = ChoosingTime;
                next.offered_times = times.clone();
                (next, vec![reply(Prompt::ChooseTime { date: *date, times: times.clone() })])
            }
        }
        (ChoosingTime, FlowEvent::TimeChosen(time)) => {
            let date = current.date.ok_or_else(|| missing_fields(current))?;
            if !current.offered_times.contains(time) {
                let times = current.offered_times.clone();
                return Ok((current.clone(), vec![reply(Prompt::InvalidTime { date, times })]));
            }
            let mut next = current.clone();
            next.time = Some(*time);
            match next.request() {
                // Intentional: after a lost race the kept contact goes straight to confirmation.
                Some(request) => {
                    next.stage = AwaitingConfirmation;
                    (next, vec![reply(Prompt::Confirm(request))])
                }
                None => {
                    next.stage = CollectingName;
                    (next, vec![reply(Prompt::EnterName)])
                }
            }
        }

        (AwaitingConfirmation, FlowEvent::Confirmed) => {
            let request = current.request().ok_or_else(|| missing_fields(current))?;
            (current.clone(), vec![FlowAction::SubmitBooking(request)])
        }
        (AwaitingConfirmation, FlowEvent::Declined) => {
            (BookingSession::default(), vec![reply(Prompt::Discarded)])
        }
        (AwaitingConfirmation, FlowEvent::BookingSucceeded { appointment_id, slot }) => (
            BookingSession::default(),
            vec![reply(Prompt::Booked { appointment_id: appointment_id.clone(), slot: *slot })],
        ),
        (
            AwaitingConfirmation,
            FlowEvent::BookingRejected(
                BookingRejection::SlotTaken(slot) | BookingRejection::SlotNotFound(slot),
            ),
        ) => {
            let mut next = current.clone();
            next.stage = ChoosingDate;
            next.date = Some(slot.date);
            next.time = None;
            next.offered_times.clear();
            (
                next,
                vec![
                    reply(Prompt::SlotLost { slot: *slot }),
                    FlowAction::LoadOpenTimes { date: slot.date },
                ],
            )
        }
        (AwaitingConfirmation, FlowEvent::BookingRejected(_)) => {
            (BookingSession::default(), vec![reply(Prompt::TryAgainLater)])
        }
        (AwaitingConfirmation, FlowEvent::BookingFailed) => {
            (current.clone(), vec![reply(Prompt::TryAgainLater)])
        }

        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                stage: current.stage,
                event: event.clone(),
            });
        }
    };

    Ok(outcome)
}

fn reply(prompt: Prompt) -> FlowAction {
    FlowAction::Reply(prompt)
}

fn missing_fields(session: &BookingSession) -> FlowTransitionError {
    FlowTransitionError::MissingRequiredFields {
        stage: session.stage,
        missing_fields: session.missing_fields(),
    }
}

fn within_horizon(date: NaiveDate, context: &FlowContext) -> bool {
    if date < context.today {
        return false;
    }
    match context.today.checked_add_days(Days::new(u64::from(context.horizon_days))) {
        Some(last) => date <= last,
        None => true,
    }
}

fn interpret(current: &BookingSession, text: &str) -> Option<FlowEvent> {
    match current.stage {
        BookingStage::ChoosingService => parse_service(text).map(FlowEvent::ServiceSelected),
        BookingStage::ChoosingStyle => parse_style(text).map(FlowEvent::StyleSelected),
        BookingStage::ChoosingDate => parse_date(text).map(FlowEvent::DateChosen),
        BookingStage::ChoosingTime => parse_time(text)
            .map(FlowEvent::TimeChosen)
            .or_else(|| parse_date(text).map(FlowEvent::DateChosen)),
        BookingStage::AwaitingConfirmation => parse_confirmation(text)
            .map(|confirmed| if confirmed { FlowEvent::Confirmed } else { FlowEvent::Declined }),
        _ => None,
    }
}

fn unparsed_input_prompt(current: &BookingSession) -> Prompt {
    match (current.stage, current.date) {
        (BookingStage::ChoosingDate, _) => Prompt::InvalidDate,
        (BookingStage::ChoosingTime, Some(date)) => {
            Prompt::InvalidTime { date, times: current.offered_times.clone() }
        }
        _ => BookingFlow.reprompt(current),
    }
}
