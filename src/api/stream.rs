use super::logging::{emit_sse_incomplete_event, emit_sse_parse_error};
use super::DeltaStream;
use crate::types::{ChatCompletionChunk, StreamDelta};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;

const DONE_MARKER: &str = "[DONE]";

#[derive(Deserialize)]
struct StreamErrorPayload {
    error: StreamErrorBody,
}

#[derive(Deserialize)]
struct StreamErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

/// Incremental decoder for `text/event-stream` chat completion bodies.
///
/// An error event that follows content in the same chunk is held back so the content is
/// returned first; fetch it with [`StreamParser::take_failure`]. A held error is also
/// returned by the next [`StreamParser::process`] call.
#[derive(Default)]
pub struct StreamParser {
    buffer: Vec<u8>,
    failure: Option<anyhow::Error>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Result<Vec<StreamDelta>> {
        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }

        self.buffer.extend_from_slice(chunk);
        let mut deltas = Vec::new();
        let mut start = 0;

        while let Some((end, separator_len)) = find_event_end(&self.buffer[start..]) {
            let event_end = start + end + separator_len;
            let event_text = String::from_utf8_lossy(&self.buffer[start..start + end]).into_owned();
            start = event_end;

            let Some(data) = event_data(&event_text) else {
                continue;
            };
            if data == DONE_MARKER {
                continue;
            }

            if let Ok(payload) = serde_json::from_str::<StreamErrorPayload>(&data) {
                // Nothing after an error event belongs to this reply.
                self.buffer.clear();
                let failure = anyhow!(
                    "stream reported {}: {}",
                    payload.error.error_type.as_deref().unwrap_or("error"),
                    payload.error.message
                );
                if deltas.is_empty() {
                    return Err(failure);
                }
                self.failure = Some(failure);
                return Ok(deltas);
            }

            match serde_json::from_str::<ChatCompletionChunk>(&data) {
                Ok(chunk) => deltas.extend(chunk.into_delta()),
                Err(e) => emit_sse_parse_error(&data, &e),
            }
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        Ok(deltas)
    }

    /// Error event held back behind the deltas of the last `process` call.
    pub fn take_failure(&mut self) -> Option<anyhow::Error> {
        self.failure.take()
    }

    /// Bytes of an event that never got its terminating blank line.
    pub fn flush(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned()
    }
}

fn find_event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn event_data(event_text: &str) -> Option<String> {
    let lines: Vec<&str> = event_text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest).trim_end())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Turn a raw SSE byte stream into chat deltas. Parser state lives for the whole stream so
/// events split across network chunks are reassembled. The stream ends after the first error.
pub fn decode_deltas<S>(bytes: S) -> DeltaStream
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    let batches = stream::unfold(
        Some((Box::pin(bytes), StreamParser::new())),
        |state| async move {
            let Some((mut bytes, mut parser)) = state else {
                return None;
            };

            let Some(chunk) = bytes.next().await else {
                let trailing = parser.flush();
                if !trailing.trim().is_empty() {
                    emit_sse_incomplete_event(&trailing);
                }
                return None;
            };

            let mut batch: Vec<Result<StreamDelta>> = Vec::new();
            let mut next_state = None;
            match chunk.and_then(|chunk| parser.process(&chunk)) {
                Ok(deltas) => {
                    batch.extend(deltas.into_iter().map(Ok));
                    match parser.take_failure() {
                        Some(failure) => batch.push(Err(failure)),
                        None => next_state = Some((bytes, parser)),
                    }
                }
                Err(error) => batch.push(Err(error)),
            }
            Some((stream::iter(batch), next_state))
        },
    );
    Box::pin(batches.flatten())
}
