mod api;

pub use api::{ChatCompletionChunk, ChatMessage, ChoiceDelta, ChunkChoice, Role, StreamDelta};
