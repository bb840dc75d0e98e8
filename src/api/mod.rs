pub mod client;
pub mod logging;
pub mod mock_client;
pub mod stream;

use crate::types::{ChatMessage, StreamDelta};
use anyhow::Result;
use futures::Stream;
use std::pin::Pin;

pub use client::ApiClient;

pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamDelta>> + Send>>;

/// Source of streamed chat replies.
///
/// Implementations must return a lazy stream: nothing is sent until the stream is first
/// polled, and dropping it abandons the request.
pub trait ChatStreamer: Send + Sync {
    fn stream_chat(&self, messages: Vec<ChatMessage>, choices: u32) -> DeltaStream;
}
