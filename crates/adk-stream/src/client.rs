use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use tokio::sync::watch;

use crate::accumulator::MessageAccumulator;
use crate::attachment::Attachment;
use crate::config::AgentConfig;
use crate::errors::{ChatError, ChatResult};
use crate::models::message::{Message, STOP_REASON};
use crate::models::role::Role;
use crate::protocol::{decode_stream, map_event, Frame, NewMessage, RunRequest};
use crate::session::SessionDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

/// What an exchange reports, in order: any number of `Progress` events followed by
/// exactly one `Completed` or `Failed`.
#[derive(Debug)]
pub enum ExchangeEvent {
    /// A frame added fragments; carries the updated snapshot
    Progress(Message),
    /// The stream ended normally; the message is closed
    Completed(Message),
    /// The exchange failed. `partial` is the discarded message if streaming had begun.
    Failed {
        error: ChatError,
        partial: Option<Message>,
    },
}

impl ExchangeEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExchangeEvent::Progress(_))
    }
}

/// Cancels the exchange it was returned with.
///
/// Cancelling ends the event stream with `Failed { error: Cancelled, partial }`, where
/// `partial` is the discarded message if streaming had begun. Dropping the handle without
/// calling `cancel` leaves the exchange running.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Resolves once cancellation is requested; never resolves if the handle is gone
async fn cancellation(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

/// Callback form of the exchange contract
pub trait ExchangeHandler {
    fn on_progress(&mut self, message: Message);
    fn on_complete(&mut self, message: Message);
    fn on_error(&mut self, error: ChatError, partial: Option<Message>);
}

/// State of one request/response exchange. Lives inside the event stream.
struct Exchange {
    state: ExchangeState,
    accumulator: MessageAccumulator,
    finish_reason: Option<String>,
}

impl Exchange {
    fn new() -> Self {
        Self {
            state: ExchangeState::Idle,
            accumulator: MessageAccumulator::new(),
            finish_reason: None,
        }
    }

    fn transition(&mut self, next: ExchangeState) {
        tracing::debug!(from = ?self.state, to = ?next, "exchange state change");
        self.state = next;
    }

    fn begin_streaming(&mut self) -> ChatResult<()> {
        self.transition(ExchangeState::Streaming);
        self.accumulator.open(Role::Agent)?;
        Ok(())
    }

    /// Map a frame into the open message. Returns a snapshot only when fragments were added.
    fn apply(&mut self, frame: Frame) -> ChatResult<Option<Message>> {
        let mapped = map_event(&frame.event);
        if let Some(reason) = mapped.finish_reason {
            self.finish_reason = Some(reason);
        }
        if mapped.fragments.is_empty() {
            tracing::trace!(sequence = frame.sequence, "frame produced no fragments");
            return Ok(None);
        }
        Ok(Some(self.accumulator.append(mapped.fragments)?))
    }

    fn complete(&mut self) -> ExchangeEvent {
        let reason = self
            .finish_reason
            .take()
            .unwrap_or_else(|| STOP_REASON.to_string());
        match self.accumulator.close(Some(reason)) {
            Ok(message) => {
                self.transition(ExchangeState::Completed);
                ExchangeEvent::Completed(message)
            }
            Err(error) => self.fail(error.into()),
        }
    }

    fn fail(&mut self, error: ChatError) -> ExchangeEvent {
        tracing::error!(%error, "exchange failed");
        let partial = if self.accumulator.is_open() {
            self.accumulator.discard().ok()
        } else {
            None
        };
        self.transition(ExchangeState::Failed);
        ExchangeEvent::Failed { error, partial }
    }
}

// Backstop for a stream dropped mid-exchange. Callers that need the discarded message
// cancel through `CancelHandle` instead.
impl Drop for Exchange {
    fn drop(&mut self) {
        if self.accumulator.is_open() {
            if let Ok(message) = self.accumulator.discard() {
                tracing::debug!(
                    id = message.id(),
                    fragments = message.fragments().len(),
                    "exchange dropped while streaming, discarded open message"
                );
            }
        }
    }
}

/// Drives streaming exchanges against the agent's run endpoint
pub struct AgentClient {
    client: Client,
    config: AgentConfig,
}

impl AgentClient {
    pub fn new(config: AgentConfig) -> ChatResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ChatError::Request)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Send a user turn and stream the agent's reply.
    ///
    /// Nothing happens until the returned stream is polled. Dropping it abandons the
    /// exchange without a terminal event; use `send_message_cancellable` to observe one.
    pub fn send_message(
        &self,
        session: &SessionDescriptor,
        text: &str,
        attachments: &[Attachment],
    ) -> BoxStream<'static, ExchangeEvent> {
        self.send_message_cancellable(session, text, attachments).0
    }

    pub fn send_message_cancellable(
        &self,
        session: &SessionDescriptor,
        text: &str,
        attachments: &[Attachment],
    ) -> (BoxStream<'static, ExchangeEvent>, CancelHandle) {
        match NewMessage::user(text, attachments) {
            Ok(message) => self.run_cancellable(RunRequest::new(session, message)),
            Err(error) => {
                let (sender, _) = watch::channel(false);
                let events = futures::stream::once(async move {
                    ExchangeEvent::Failed {
                        error,
                        partial: None,
                    }
                })
                .boxed();
                (events, CancelHandle { sender })
            }
        }
    }

    /// Run a prepared request as one exchange
    pub fn run(&self, request: RunRequest) -> BoxStream<'static, ExchangeEvent> {
        self.run_cancellable(request).0
    }

    /// Run a prepared request, returning a handle that can cancel it mid-flight
    pub fn run_cancellable(
        &self,
        request: RunRequest,
    ) -> (BoxStream<'static, ExchangeEvent>, CancelHandle) {
        let client = self.client.clone();
        let url = self.config.run_url();
        let (sender, mut cancel_rx) = watch::channel(false);

        let events = Box::pin(async_stream::stream! {
            let mut exchange = Exchange::new();
            exchange.transition(ExchangeState::Sending);

            let sent = tokio::select! {
                biased;
                _ = cancellation(&mut cancel_rx) => None,
                result = client
                    .post(&url)
                    .header(ACCEPT, "text/event-stream")
                    .json(&request)
                    .send() => Some(result),
            };
            let response = match sent {
                Some(Ok(response)) => response,
                Some(Err(error)) => {
                    yield exchange.fail(ChatError::Request(error));
                    return;
                }
                None => {
                    yield exchange.fail(ChatError::Cancelled);
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                yield exchange.fail(ChatError::Status {
                    status: status.as_u16(),
                    body,
                });
                return;
            }

            if let Err(error) = exchange.begin_streaming() {
                yield exchange.fail(error);
                return;
            }

            let frames = decode_stream(response.bytes_stream());
            futures::pin_mut!(frames);
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancellation(&mut cancel_rx) => None,
                    frame = frames.next() => Some(frame),
                };
                let frame = match next {
                    None => {
                        yield exchange.fail(ChatError::Cancelled);
                        return;
                    }
                    Some(None) => break,
                    Some(Some(Ok(frame))) => frame,
                    Some(Some(Err(error))) => {
                        yield exchange.fail(ChatError::Body(error));
                        return;
                    }
                };
                match exchange.apply(frame) {
                    Ok(Some(snapshot)) => yield ExchangeEvent::Progress(snapshot),
                    Ok(None) => {}
                    Err(error) => {
                        yield exchange.fail(error);
                        return;
                    }
                }
            }

            yield exchange.complete();
        });

        (events, CancelHandle { sender })
    }

    /// Callback-driven variant of `send_message`
    pub async fn send_with_handler<H: ExchangeHandler>(
        &self,
        session: &SessionDescriptor,
        text: &str,
        attachments: &[Attachment],
        handler: &mut H,
    ) {
        let mut events = self.send_message(session, text, attachments);
        while let Some(event) = events.next().await {
            match event {
                ExchangeEvent::Progress(message) => handler.on_progress(message),
                ExchangeEvent::Completed(message) => {
                    handler.on_complete(message);
                    break;
                }
                ExchangeEvent::Failed { error, partial } => {
                    handler.on_error(error, partial);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::ABORTED_REASON;
    use crate::protocol::StreamEvent;
    use serde_json::json;

    fn frame(sequence: u64, value: serde_json::Value) -> Frame {
        Frame {
            sequence,
            event: serde_json::from_value::<StreamEvent>(value).expect("valid event"),
        }
    }

    fn text_frame(sequence: u64, text: &str) -> Frame {
        frame(sequence, json!({"content": {"parts": [{"text": text}], "role": "model"}}))
    }

    #[test]
    fn test_exchange_happy_path() -> ChatResult<()> {
        let mut exchange = Exchange::new();
        exchange.transition(ExchangeState::Sending);
        exchange.begin_streaming()?;
        assert_eq!(exchange.state, ExchangeState::Streaming);

        let first = exchange.apply(text_frame(0, "Hel"))?.expect("snapshot");
        assert_eq!(first.fragments().len(), 1);
        assert!(exchange
            .apply(frame(1, json!({"finishReason": "MAX_TOKENS"})))?
            .is_none());
        let second = exchange.apply(text_frame(2, "lo"))?.expect("snapshot");
        assert_eq!(second.fragments().len(), 2);

        match exchange.complete() {
            ExchangeEvent::Completed(message) => {
                assert_eq!(message.termination_reason(), Some("MAX_TOKENS"));
                assert_eq!(message.text(), "Hel lo");
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(exchange.state, ExchangeState::Completed);
        Ok(())
    }

    #[test]
    fn test_exchange_defaults_to_stop() -> ChatResult<()> {
        let mut exchange = Exchange::new();
        exchange.begin_streaming()?;
        match exchange.complete() {
            ExchangeEvent::Completed(message) => {
                assert_eq!(message.termination_reason(), Some(STOP_REASON));
                assert!(message.fragments().is_empty());
            }
            other => panic!("expected completion, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_failure_after_progress_keeps_partial() -> ChatResult<()> {
        let mut exchange = Exchange::new();
        exchange.begin_streaming()?;
        exchange.apply(text_frame(0, "partial"))?;

        match exchange.fail(ChatError::Cancelled) {
            ExchangeEvent::Failed { error, partial } => {
                assert!(matches!(error, ChatError::Cancelled));
                let partial = partial.expect("partial message");
                assert_eq!(partial.text(), "partial");
                assert_eq!(partial.termination_reason(), Some(ABORTED_REASON));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(exchange.state, ExchangeState::Failed);
        assert!(!exchange.accumulator.is_open());
        Ok(())
    }

    #[test]
    fn test_failure_before_streaming_has_no_partial() {
        let mut exchange = Exchange::new();
        exchange.transition(ExchangeState::Sending);
        match exchange.fail(ChatError::Status {
            status: 500,
            body: String::new(),
        }) {
            ExchangeEvent::Failed { partial, .. } => assert!(partial.is_none()),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_terminal_events() {
        assert!(!ExchangeEvent::Progress(Message::user_text("x")).is_terminal());
        assert!(ExchangeEvent::Completed(Message::user_text("x")).is_terminal());
        assert!(ExchangeEvent::Failed {
            error: ChatError::Cancelled,
            partial: None
        }
        .is_terminal());
    }

    #[tokio::test]
    async fn test_cancellation_fires_after_cancel() {
        let (sender, mut cancel_rx) = watch::channel(false);
        let handle = CancelHandle { sender };
        assert!(!handle.is_cancelled());

        handle.cancel();
        assert!(handle.is_cancelled());
        tokio::time::timeout(std::time::Duration::from_secs(1), cancellation(&mut cancel_rx))
            .await
            .expect("cancellation should resolve");
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let (sender, mut cancel_rx) = watch::channel(false);
        drop(CancelHandle { sender });

        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            cancellation(&mut cancel_rx),
        )
        .await;
        assert!(waited.is_err());
    }
}
