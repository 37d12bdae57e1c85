use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use lashbook_core::clock::Clock;
use lashbook_core::domain::booking::BookingRequest;
use lashbook_core::flows::{
    BookingFlow, BookingSession, BookingStage, FlowAction, FlowContext, FlowEvent, Prompt,
};
use lashbook_core::identity::{Identity, UserId};
use lashbook_db::{RepositoryError, ReservationError};

use crate::reservation::ReservationEngine;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationReply {
    pub prompts: Vec<Prompt>,
    pub stage: BookingStage,
}

/// Owns one booking dialog per user and performs the effects the flow asks for.
///
/// A session lives only in memory until it returns to `Idle`. Starting over replaces whatever
/// the user had collected so far.
pub struct ConversationEngine {
    flow: BookingFlow,
    reservations: Arc<ReservationEngine>,
    clock: Arc<dyn Clock>,
    horizon_days: u32,
    sessions: Mutex<HashMap<UserId, BookingSession>>,
}

impl ConversationEngine {
    pub fn new(
        reservations: Arc<ReservationEngine>,
        clock: Arc<dyn Clock>,
        horizon_days: u32,
    ) -> Self {
        Self {
            flow: BookingFlow,
            reservations,
            clock,
            horizon_days,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn reservations(&self) -> &Arc<ReservationEngine> {
        &self.reservations
    }

    pub async fn session(&self, user: &UserId) -> Option<BookingSession> {
        self.sessions.lock().await.get(user).cloned()
    }

    pub async fn handle(&self, identity: &Identity, event: FlowEvent) -> ConversationReply {
        let now = self.clock.now();
        let context = FlowContext { today: now.date_naive(), horizon_days: self.horizon_days };
        let mut session = self
            .sessions
            .lock()
            .await
            .get(&identity.user_id)
            .cloned()
            .unwrap_or_else(|| self.flow.initial_session());

        let mut prompts = Vec::new();
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let outcome = match self.flow.apply(&session, &event, &context) {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(
                        event_name = "conversation.transition.rejected",
                        correlation_id = %identity.user_id,
                        stage = ?session.stage,
                        error = %error,
                        "event does not apply to the current stage"
                    );
                    prompts.push(self.flow.reprompt(&session));
                    break;
                }
            };

            debug!(
                event_name = "conversation.transition.applied",
                correlation_id = %identity.user_id,
                from = ?outcome.from,
                to = ?outcome.to,
                "conversation advanced"
            );
            session = outcome.session;

            for action in outcome.actions {
                match action {
                    FlowAction::Reply(prompt) => prompts.push(prompt),
                    FlowAction::LoadOpenTimes { date } => match self.open_times(date, now).await {
                        Ok(times) => pending.push_back(FlowEvent::OpenTimesLoaded { date, times }),
                        Err(error) => {
                            warn!(
                                event_name = "conversation.open_times.failed",
                                correlation_id = %identity.user_id,
                                date = %date,
                                error = %error,
                                "could not load open times"
                            );
                            prompts.push(Prompt::TryAgainLater);
                        }
                    },
                    FlowAction::SubmitBooking(request) => {
                        pending.push_back(self.submit(identity, request).await);
                    }
                }
            }
        }

        let stage = session.stage;
        let mut sessions = self.sessions.lock().await;
        if stage == BookingStage::Idle {
            sessions.remove(&identity.user_id);
        } else {
            sessions.insert(identity.user_id.clone(), session);
        }

        ConversationReply { prompts, stage }
    }

    /// Open times of `date`, without the ones that have already begun when `date` is today.
    async fn open_times(
        &self,
        date: NaiveDate,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<NaiveTime>, RepositoryError> {
        let times = self.reservations.list_open_slots(date).await?;
        let local_now = now.naive_local();
        Ok(times.into_iter().filter(|time| date.and_time(*time) > local_now).collect())
    }

    async fn submit(&self, identity: &Identity, request: BookingRequest) -> FlowEvent {
        match self.reservations.book(identity, request).await {
            Ok(appointment) => FlowEvent::BookingSucceeded {
                appointment_id: appointment.id,
                slot: appointment.slot,
            },
            Err(ReservationError::Rejected(rejection)) => FlowEvent::BookingRejected(rejection),
            Err(ReservationError::Repository(error)) => {
                warn!(
                    event_name = "conversation.booking.failed",
                    correlation_id = %identity.user_id,
                    error = %error,
                    "booking could not be stored"
                );
                FlowEvent::BookingFailed
            }
        }
    }
}
