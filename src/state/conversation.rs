use crate::types::ChatMessage;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedConversation = Arc<Mutex<Conversation>>;

/// Chat history plus the assistant reply currently being streamed.
///
/// A reply opens when a user message is pushed and closes exactly once through
/// [`Conversation::finalize_reply`], whether the turn finished, failed, or was cancelled.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    pending_reply: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedConversation {
        Arc::new(Mutex::new(self))
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn messages_for_api(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    pub fn pending_reply(&self) -> Option<&str> {
        self.pending_reply.as_deref()
    }

    pub fn push_user_message(&mut self, input: String) {
        // A reply left open would otherwise land after this user message.
        self.finalize_reply();
        self.messages.push(ChatMessage::user(input));
        self.pending_reply = Some(String::new());
    }

    /// Returns false when no reply is open.
    pub fn append_reply(&mut self, text: &str) -> bool {
        match self.pending_reply.as_mut() {
            Some(reply) => {
                reply.push_str(text);
                true
            }
            None => false,
        }
    }

    /// Commits the open reply, even when empty. Returns false if none was open.
    pub fn finalize_reply(&mut self) -> bool {
        match self.pending_reply.take() {
            Some(reply) => {
                self.messages.push(ChatMessage::assistant(reply));
                true
            }
            None => false,
        }
    }
}
