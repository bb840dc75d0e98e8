use crate::api::logging::{emit_task_panic, emit_turn_error};
use crate::api::{ChatStreamer, DeltaStream};
use crate::state::SharedConversation;
use crate::types::StreamDelta;
use crate::ui::prompt::PromptInput;
use crate::ui::render::Renderer;
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::SharedPrompt;

/// Choices requested per turn; the delta decoder only follows single-choice replies.
pub const REPLY_CHOICES: u32 = 1;

/// How a request task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply carried its finish signal and was committed.
    Finished,
    /// The stream closed without a finish signal; the partial reply was committed.
    Ended,
    /// The stream failed; the partial reply was committed.
    Failed(String),
    /// Cancelled before finishing; the caller commits the partial reply.
    Cancelled,
}

struct RequestHandle {
    cancel: CancellationToken,
    task: JoinHandle<TurnOutcome>,
}

/// Runs one cancellable streaming request per submitted user line.
pub struct RequestCoordinator {
    client: Arc<dyn ChatStreamer>,
    conversation: SharedConversation,
    prompt: SharedPrompt,
    renderer: Renderer,
    current: Option<RequestHandle>,
}

impl RequestCoordinator {
    pub fn new(
        client: Arc<dyn ChatStreamer>,
        conversation: SharedConversation,
        prompt: SharedPrompt,
        renderer: Renderer,
    ) -> Self {
        Self {
            client,
            conversation,
            prompt,
            renderer,
            current: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn has_live_request(&self) -> bool {
        self.current.is_some()
    }

    /// Starts a turn for `text`. Any previous request is cancelled and drained first.
    pub async fn submit(&mut self, text: String) {
        self.cancel_current().await;

        let messages = {
            let mut conversation = self.conversation.lock().await;
            conversation.push_user_message(text);
            conversation.messages_for_api()
        };
        let deltas = self.client.stream_chat(messages, REPLY_CHOICES);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_turn(
            deltas,
            cancel.clone(),
            Arc::clone(&self.conversation),
            Arc::clone(&self.prompt),
        ));
        self.current = Some(RequestHandle { cancel, task });
    }

    /// Cancels the live request, waits until it can no longer write, and commits whatever
    /// it had streamed. Returns `None` when no request was tracked.
    pub async fn cancel_current(&mut self) -> Option<TurnOutcome> {
        let handle = self.current.take()?;
        handle.cancel.cancel();
        let outcome = self.settle(handle.task).await;

        if outcome == TurnOutcome::Cancelled {
            self.conversation.lock().await.finalize_reply();
            self.renderer.newline();
        }
        Some(outcome)
    }

    #[cfg(test)]
    pub(crate) async fn wait_current(&mut self) -> Option<TurnOutcome> {
        let handle = self.current.take()?;
        Some(self.settle(handle.task).await)
    }

    async fn settle(&self, task: JoinHandle<TurnOutcome>) -> TurnOutcome {
        match task.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                emit_task_panic("streaming request", &join_error.to_string());
                self.prompt.lock().await.stop_waiting().await;
                self.conversation.lock().await.finalize_reply();
                TurnOutcome::Failed(join_error.to_string())
            }
        }
    }
}

async fn run_turn(
    deltas: DeltaStream,
    cancel: CancellationToken,
    conversation: SharedConversation,
    prompt: SharedPrompt,
) -> TurnOutcome {
    if cancel.is_cancelled() {
        return TurnOutcome::Cancelled;
    }

    prompt.lock().await.start_waiting().await;
    let outcome = consume_deltas(deltas, &cancel, &conversation, &prompt).await;

    match &outcome {
        TurnOutcome::Ended | TurnOutcome::Failed(_) => {
            conversation.lock().await.finalize_reply();
        }
        TurnOutcome::Finished | TurnOutcome::Cancelled => {}
    }
    prompt.lock().await.stop_waiting().await;
    outcome
}

async fn consume_deltas(
    mut deltas: DeltaStream,
    cancel: &CancellationToken,
    conversation: &SharedConversation,
    prompt: &SharedPrompt,
) -> TurnOutcome {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TurnOutcome::Cancelled,
            next = deltas.next() => next,
        };

        match next {
            Some(Ok(StreamDelta::Content(text))) => {
                conversation.lock().await.append_reply(&text);
                prompt.lock().await.display_chunk(&text).await;
            }
            Some(Ok(StreamDelta::Finish)) => {
                let mut prompt = prompt.lock().await;
                prompt.stop_waiting().await;
                conversation.lock().await.finalize_reply();
                prompt.accept_input(PromptInput::Redraw);
                return TurnOutcome::Finished;
            }
            Some(Err(error)) => {
                emit_turn_error(&error);
                return TurnOutcome::Failed(error.to_string());
            }
            None => return TurnOutcome::Ended,
        }
    }
}
