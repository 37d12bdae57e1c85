use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use tracing::warn;

use lashbook_core::domain::appointment::AppointmentId;
use lashbook_core::domain::slot::{parse_date, parse_time, SlotKey};
use lashbook_core::errors::{ApplicationError, BookingRejection};
use lashbook_core::flows::FlowEvent;
use lashbook_core::identity::Identity;
use lashbook_db::ReservationError;
use lashbook_engine::ConversationEngine;

use crate::render;

/// Which appointment a `/cancel` or `/move` refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppointmentRef {
    /// 1-based position in the caller's `/bookings` list.
    Position(usize),
    Id(AppointmentId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatCommand {
    Flow(FlowEvent),
    MyBookings,
    Cancel(AppointmentRef),
    Move { target: AppointmentRef, slot: SlotKey },
    Day(NaiveDate),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("`{0}` is not a date (YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("`{0}` is not a time (HH:MM)")]
    InvalidTime(String),
}

const CANCEL_USAGE: &str = "/cancel <number from /bookings>";
const MOVE_USAGE: &str = "/move <number or id> <YYYY-MM-DD> <HH:MM>";
const DAY_USAGE: &str = "/day <YYYY-MM-DD>";

impl ChatCommand {
    /// Slash commands are recognised by their verb; any other text feeds the booking dialog.
    pub fn parse(input: &str) -> Result<Self, CommandParseError> {
        let trimmed = input.trim();
        let mut parts = trimmed.split_whitespace();
        let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        let command = match verb.as_str() {
            "/start" | "/book" => Self::Flow(FlowEvent::Start),
            "/restart" | "/menu" => Self::Flow(FlowEvent::Restart),
            "/bookings" => Self::MyBookings,
            "/cancel" => match args.as_slice() {
                [target] => Self::Cancel(appointment_ref(target)),
                _ => return Err(CommandParseError::Usage(CANCEL_USAGE)),
            },
            "/move" => match args.as_slice() {
                [target, date, time] => Self::Move {
                    target: appointment_ref(target),
                    slot: SlotKey::new(date_arg(date)?, time_arg(time)?),
                },
                _ => return Err(CommandParseError::Usage(MOVE_USAGE)),
            },
            "/day" => match args.as_slice() {
                [date] => Self::Day(date_arg(date)?),
                _ => return Err(CommandParseError::Usage(DAY_USAGE)),
            },
            _ => Self::Flow(FlowEvent::TextEntered(trimmed.to_owned())),
        };
        Ok(command)
    }
}

fn appointment_ref(token: &str) -> AppointmentRef {
    match token.parse::<usize>() {
        Ok(position) => AppointmentRef::Position(position),
        Err(_) => AppointmentRef::Id(AppointmentId(token.to_owned())),
    }
}

fn date_arg(token: &str) -> Result<NaiveDate, CommandParseError> {
    parse_date(token).ok_or_else(|| CommandParseError::InvalidDate(token.to_owned()))
}

fn time_arg(token: &str) -> Result<NaiveTime, CommandParseError> {
    parse_time(token).ok_or_else(|| CommandParseError::InvalidTime(token.to_owned()))
}

/// Turns one chat message into the texts to send back.
pub struct CommandRouter {
    conversations: Arc<ConversationEngine>,
}

impl CommandRouter {
    pub fn new(conversations: Arc<ConversationEngine>) -> Self {
        Self { conversations }
    }

    pub async fn handle_text(
        &self,
        identity: &Identity,
        text: &str,
        correlation_id: &str,
    ) -> Vec<String> {
        match ChatCommand::parse(text) {
            Ok(command) => self.route(identity, command, correlation_id).await,
            Err(error) => vec![error.to_string()],
        }
    }

    pub async fn route(
        &self,
        identity: &Identity,
        command: ChatCommand,
        correlation_id: &str,
    ) -> Vec<String> {
        let reservations = self.conversations.reservations();
        let result = match command {
            ChatCommand::Flow(event) => {
                let reply = self.conversations.handle(identity, event).await;
                return reply.prompts.iter().map(render::prompt).collect();
            }
            ChatCommand::MyBookings => reservations
                .appointments_for_owner(identity)
                .await
                .map(|appointments| render::my_bookings(&appointments))
                .map_err(ReservationError::from),
            ChatCommand::Cancel(target) => match self.resolve(identity, target).await {
                Ok(id) => reservations.cancel(identity, &id).await.map(|outcome| {
                    if outcome.transitioned() {
                        format!("Canceled your appointment on {}.", outcome.appointment().slot)
                    } else {
                        "That appointment was already canceled.".to_owned()
                    }
                }),
                Err(error) => Err(error),
            },
            ChatCommand::Move { target, slot } => match self.resolve(identity, target).await {
                Ok(id) => reservations.reschedule(identity, &id, slot).await.map(|moved| {
                    format!("Moved from {} to {}.", moved.previous, moved.appointment.slot)
                }),
                Err(error) => Err(error),
            },
            ChatCommand::Day(date) => reservations
                .appointments_for_date(identity, date)
                .await
                .map(|appointments| render::day_view(&date, &appointments)),
        };

        match result {
            Ok(text) => vec![text],
            Err(ReservationError::Rejected(rejection)) => vec![render::rejection(&rejection)],
            Err(error) => {
                warn!(
                    event_name = "ingress.chat.command_failed",
                    correlation_id,
                    error = %error,
                    "chat command failed"
                );
                let interface = ApplicationError::from(error).into_interface(correlation_id);
                vec![interface.user_message().to_owned()]
            }
        }
    }

    async fn resolve(
        &self,
        identity: &Identity,
        target: AppointmentRef,
    ) -> Result<AppointmentId, ReservationError> {
        match target {
            AppointmentRef::Id(id) => Ok(id),
            AppointmentRef::Position(position) => {
                let reservations = self.conversations.reservations();
                let mine = reservations.appointments_for_owner(identity).await?;
                position
                    .checked_sub(1)
                    .and_then(|idx| mine.get(idx))
                    .map(|appointment| appointment.id.clone())
                    .ok_or_else(|| {
                        BookingRejection::AppointmentNotFound(AppointmentId(position.to_string()))
                            .into()
                    })
            }
        }
    }
}
