use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::identity::UserId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("recipient {0} is unreachable")]
    Unreachable(UserId),
    #[error("notice delivery failed: {0}")]
    Delivery(String),
}

/// Outbound text channel to clients and admins. Failures are never fatal to callers.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &UserId, text: &str) -> Result<(), NotifyError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentNotice {
    pub recipient: UserId,
    pub text: String,
}

/// Records every delivered notice; failures can be scripted ahead of time.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<RecordingState>>,
}

#[derive(Default)]
struct RecordingState {
    sent: Vec<SentNotice>,
    scripted_failures: VecDeque<NotifyError>,
    attempts: usize,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentNotice> {
        self.with_state(|state| state.sent.clone())
    }

    pub fn sent_to(&self, recipient: &UserId) -> Vec<String> {
        self.with_state(|state| {
            state
                .sent
                .iter()
                .filter(|notice| &notice.recipient == recipient)
                .map(|notice| notice.text.clone())
                .collect()
        })
    }

    pub fn attempts(&self) -> usize {
        self.with_state(|state| state.attempts)
    }

    /// The next `count` deliveries fail with `error`.
    pub fn fail_next(&self, count: usize, error: NotifyError) {
        self.with_state(|state| {
            state.scripted_failures.extend(std::iter::repeat(error).take(count));
        });
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RecordingState) -> T) -> T {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &UserId, text: &str) -> Result<(), NotifyError> {
        self.with_state(|state| {
            state.attempts += 1;
            if let Some(error) = state.scripted_failures.pop_front() {
                return Err(error);
            }
            state.sent.push(SentNotice { recipient: recipient.clone(), text: text.to_owned() });
            Ok(())
        })
    }
}
