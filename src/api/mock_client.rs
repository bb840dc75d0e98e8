use super::{ChatStreamer, DeltaStream};
use crate::types::{ChatMessage, StreamDelta};
use anyhow::{anyhow, Result};
use futures::{stream, Stream, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// How one scripted reply plays out.
pub enum MockReply {
    /// Yields the deltas, then ends.
    Complete(Vec<StreamDelta>),
    /// Yields the deltas, then never produces another item.
    Stall(Vec<StreamDelta>),
    /// Yields the deltas, then fails with the given message.
    Fail(Vec<StreamDelta>, String),
    /// Forwards whatever the test pushes into the paired sender; ends when it is dropped.
    Live(mpsc::UnboundedReceiver<StreamDelta>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub choices: u32,
}

/// Scripted `ChatStreamer` that hands out one reply per request, in order.
#[derive(Clone, Default)]
pub struct MockChatStreamer {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockChatStreamer {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ChatStreamer for MockChatStreamer {
    fn stream_chat(&self, messages: Vec<ChatMessage>, choices: u32) -> DeltaStream {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest { messages, choices });

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match reply {
            Some(MockReply::Complete(deltas)) => Box::pin(scripted(deltas)),
            Some(MockReply::Stall(deltas)) => Box::pin(scripted(deltas).chain(stream::pending())),
            Some(MockReply::Fail(deltas, message)) => Box::pin(
                scripted(deltas).chain(stream::once(async move { Err(anyhow!(message)) })),
            ),
            Some(MockReply::Live(receiver)) => {
                Box::pin(stream::unfold(receiver, |mut receiver| async move {
                    match receiver.recv().await {
                        Some(delta) => Some((Ok::<_, anyhow::Error>(delta), receiver)),
                        None => None,
                    }
                }))
            }
            None => Box::pin(stream::once(async {
                Err::<StreamDelta, _>(anyhow!("MockChatStreamer: No more replies configured"))
            })),
        }
    }
}

fn scripted(deltas: Vec<StreamDelta>) -> impl Stream<Item = Result<StreamDelta>> + Send {
    stream::iter(deltas.into_iter().map(Ok::<_, anyhow::Error>))
}
