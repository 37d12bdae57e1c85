use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use lashbook_core::identity::{Identity, UserId};
use lashbook_core::notify::{Notifier, NotifyError};
use lashbook_engine::ConversationEngine;

use crate::commands::CommandRouter;

/// One inbound text message from a chat client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatUpdate {
    pub update_id: String,
    pub chat_id: String,
    pub user_id: String,
    pub handle: Option<String>,
    pub text: String,
}

impl ChatUpdate {
    pub fn identity(&self) -> Identity {
        Identity::new(self.user_id.clone(), self.handle.as_deref())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `None` once the update stream has closed.
    async fn next_update(&self) -> Result<Option<ChatUpdate>, TransportError>;
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<ChatUpdate>, TransportError> {
        Ok(None)
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        debug!(chat_id, chars = text.len(), "noop transport dropped outbound text");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Delivers notices as direct messages; a user's private chat id equals their user id.
pub struct TransportNotifier {
    transport: Arc<dyn ChatTransport>,
}

impl TransportNotifier {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Notifier for TransportNotifier {
    async fn send(&self, recipient: &UserId, text: &str) -> Result<(), NotifyError> {
        self.transport
            .send_text(&recipient.0, text)
            .await
            .map_err(|error| NotifyError::Delivery(error.to_string()))
    }
}

pub struct ChatRunner {
    transport: Arc<dyn ChatTransport>,
    router: CommandRouter,
    reconnect_policy: ReconnectPolicy,
}

impl ChatRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        conversations: Arc<ConversationEngine>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, router: CommandRouter::new(conversations), reconnect_policy }
    }

    /// Pumps updates until the stream closes or reconnect retries run out. Never fails the process.
    ///
    /// Only consecutive failures count against `max_retries`; a session that connected resets
    /// the budget.
    pub async fn start(&self) {
        let mut failures: u32 = 0;
        loop {
            let mut connected = false;
            let Err(transport_error) = self.connect_and_pump(failures, &mut connected).await
            else {
                return;
            };
            if connected {
                failures = 0;
            }
            warn!(
                event_name = "ingress.chat.transport_failed",
                attempt = failures,
                max_retries = self.reconnect_policy.max_retries,
                connected,
                error = %transport_error,
                "chat transport failed"
            );

            if failures >= self.reconnect_policy.max_retries {
                warn!(
                    max_retries = self.reconnect_policy.max_retries,
                    "chat transport retries exhausted; continuing process without crash"
                );
                return;
            }

            let delay = self.reconnect_policy.backoff(failures);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            failures += 1;
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        connected: &mut bool,
    ) -> Result<(), TransportError> {
        info!(attempt, "opening chat transport connection");
        self.transport.connect().await?;
        *connected = true;
        info!(attempt, "chat transport connected");

        loop {
            let Some(update) = self.transport.next_update().await? else {
                info!(attempt, "chat transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.chat.update_received",
                correlation_id = %update.update_id,
                user_id = %update.user_id,
                "received chat update"
            );

            let replies =
                self.router.handle_text(&update.identity(), &update.text, &update.update_id).await;
            for reply in replies {
                if let Err(error) = self.transport.send_text(&update.chat_id, &reply).await {
                    warn!(
                        event_name = "egress.chat.reply_failed",
                        correlation_id = %update.update_id,
                        chat_id = %update.chat_id,
                        error = %error,
                        "reply could not be sent; continuing chat loop"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::FixedOffset;
    use tokio::sync::Mutex;

    use lashbook_core::clock::{Clock, SystemClock};
    use lashbook_core::identity::{StaticAdminDirectory, UserId};
    use lashbook_core::notify::{Notifier, NotifyError, RecordingNotifier};
    use lashbook_engine::{ConversationEngine, ReservationEngine, Storage};

    use super::{
        ChatRunner, ChatTransport, ChatUpdate, ReconnectPolicy, TransportError, TransportNotifier,
    };

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        updates: VecDeque<Result<Option<ChatUpdate>, TransportError>>,
        send_results: VecDeque<Result<(), TransportError>>,
        connect_attempts: usize,
        sent: Vec<(String, String)>,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            updates: Vec<Result<Option<ChatUpdate>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    updates: updates.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn sent(&self) -> Vec<(String, String)> {
            self.state.lock().await.sent.clone()
        }

        async fn fail_next_send(&self, error: TransportError) {
            self.state.lock().await.send_results.push_back(Err(error));
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_update(&self) -> Result<Option<ChatUpdate>, TransportError> {
            let mut state = self.state.lock().await;
            state.updates.pop_front().unwrap_or(Ok(None))
        }

        async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.send_results.pop_front().unwrap_or(Ok(()))?;
            state.sent.push((chat_id.to_owned(), text.to_owned()));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn conversations() -> Arc<ConversationEngine> {
        let clock: Arc<dyn Clock> =
            Arc::new(SystemClock::new(FixedOffset::east_opt(7200).expect("offset")));
        let reservations = Arc::new(ReservationEngine::new(
            Storage::in_memory(),
            Arc::new(RecordingNotifier::default()),
            Arc::new(StaticAdminDirectory::default()),
            clock.clone(),
        ));
        Arc::new(ConversationEngine::new(reservations, clock, 60))
    }

    fn update(id: &str, text: &str) -> ChatUpdate {
        ChatUpdate {
            update_id: id.to_owned(),
            chat_id: "42".to_owned(),
            user_id: "42".to_owned(),
            handle: Some("maria".to_owned()),
            text: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure_and_replies() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(update("upd-1", "/start"))), Ok(None)],
        ));
        let runner = ChatRunner::new(
            transport.clone(),
            conversations(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await;

        assert_eq!(transport.connect_attempts().await, 2);
        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "42");
        assert!(sent[0].1.starts_with("Which service would you like?"));
    }

    #[tokio::test]
    async fn healthy_sessions_reset_the_retry_budget() {
        let dropped = || Err(TransportError::Receive("connection reset".to_owned()));
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(update("upd-1", "/start"))),
                dropped(),
                Ok(Some(update("upd-2", "/start"))),
                dropped(),
                Ok(Some(update("upd-3", "/start"))),
                dropped(),
                Ok(Some(update("upd-4", "/start"))),
                Ok(None),
            ],
        ));
        let runner = ChatRunner::new(
            transport.clone(),
            conversations(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await;

        assert_eq!(transport.connect_attempts().await, 4);
        assert_eq!(transport.sent().await.len(), 4, "every reconnected session is served");
    }

    #[tokio::test]
    async fn connect_failures_after_a_healthy_session_get_a_fresh_budget() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Ok(()),
                Err(TransportError::Connect("fail-1".to_owned())),
                Ok(()),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![
                Ok(Some(update("upd-1", "/start"))),
                Err(TransportError::Receive("connection reset".to_owned())),
                Ok(Some(update("upd-2", "/start"))),
                Err(TransportError::Receive("connection reset".to_owned())),
            ],
        ));
        let runner = ChatRunner::new(
            transport.clone(),
            conversations(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await;

        assert_eq!(transport.connect_attempts().await, 5);
        assert_eq!(transport.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));
        let runner = ChatRunner::new(
            transport.clone(),
            conversations(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await;

        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn failed_reply_does_not_stop_the_loop() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(update("upd-1", "/start"))),
                Ok(Some(update("upd-2", "1"))),
                Ok(None),
            ],
        ));
        transport.fail_next_send(TransportError::Send("rate limited".to_owned())).await;
        let runner = ChatRunner::new(
            transport.clone(),
            conversations(),
            ReconnectPolicy { max_retries: 0, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await;

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.starts_with("Send the date"));
    }

    #[tokio::test]
    async fn notifier_sends_direct_messages_over_the_transport() {
        let transport = Arc::new(ScriptedTransport::default());
        let notifier = TransportNotifier::new(transport.clone());

        notifier.send(&UserId("9000".to_owned()), "New booking").await.expect("deliver");
        transport.fail_next_send(TransportError::Send("blocked".to_owned())).await;
        let failed = notifier.send(&UserId("9000".to_owned()), "second").await;

        assert_eq!(transport.sent().await, vec![("9000".to_owned(), "New booking".to_owned())]);
        assert!(matches!(
            failed,
            Err(NotifyError::Delivery(message)) if message.contains("blocked")
        ));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = ReconnectPolicy { max_retries: 10, base_delay_ms: 250, max_delay_ms: 5_000 };

        assert_eq!(policy.backoff(0).as_millis(), 250);
        assert_eq!(policy.backoff(2).as_millis(), 1_000);
        assert_eq!(policy.backoff(9).as_millis(), 5_000);
    }
}
